//! Utility functions for names, sizes and disk space

use std::path::Path;

/// Strip a client-supplied name down to its final path component
///
/// Both `/` and `\` count as separators regardless of platform, so a name
/// like `..\..\boot.ini` cannot smuggle a traversal segment through on a
/// platform that does not treat `\` as a separator. Returns `None` when
/// nothing usable remains (`""`, `"."`, `".."`, trailing separator only).
///
/// # Examples
///
/// ```
/// use dirindex::utils::final_component;
///
/// assert_eq!(final_component("../../etc/passwd"), Some("passwd"));
/// assert_eq!(final_component("a.txt"), Some("a.txt"));
/// assert_eq!(final_component(".."), None);
/// ```
#[must_use]
pub fn final_component(name: &str) -> Option<&str> {
    let last = name
        .rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty())?;

    match last {
        "." | ".." => None,
        s if s.contains('\0') => None,
        s => Some(s),
    }
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`
///
/// Used for archive base names so the result is safe in a
/// `Content-Disposition` header and on any filesystem.
#[must_use]
pub fn sanitize_base_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Sanitize a full download filename supplied by a client
///
/// Like [`sanitize_base_name`] but keeps `.` so the extension survives.
/// Leading dots are replaced so the result is never a hidden or relative name.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .enumerate()
        .map(|(i, c)| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || (c == '.' && i > 0) {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned
}

/// Format a byte count for humans (`1.5 GB`, `100 B`)
///
/// Uses 1024-based units and at most two decimals, trailing zeros trimmed.
#[must_use]
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

/// Get available disk space for a given path
///
/// Uses platform-specific APIs to query filesystem statistics:
/// - Linux/macOS: statvfs
/// - Windows: GetDiskFreeSpaceExW
///
/// Returns the space available to unprivileged users in bytes, or an IO error
/// if the check fails.
pub fn get_available_space(path: &Path) -> std::io::Result<u64> {
    #[cfg(unix)]
    {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        // SAFETY: c_path is a valid NUL-terminated string, stat is zeroed
        // before the call and only read after statvfs reports success.
        unsafe {
            let mut stat: libc::statvfs = std::mem::zeroed();
            if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
                return Err(std::io::Error::last_os_error());
            }

            // f_bavail: blocks available to unprivileged users, f_frsize: fragment size
            #[allow(clippy::unnecessary_cast)]
            let available_bytes = (stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64);
            Ok(available_bytes)
        }
    }

    #[cfg(windows)]
    {
        use std::os::windows::ffi::OsStrExt;
        use winapi::um::fileapi::GetDiskFreeSpaceExW;

        let wide_path: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        // SAFETY: wide_path is NUL-terminated and every out pointer refers to
        // a live u64 that is only read after a successful call.
        unsafe {
            let mut free_bytes_available: u64 = 0;
            let mut total_bytes: u64 = 0;
            let mut total_free_bytes: u64 = 0;

            if GetDiskFreeSpaceExW(
                wide_path.as_ptr(),
                &mut free_bytes_available as *mut u64 as *mut _,
                &mut total_bytes as *mut u64 as *mut _,
                &mut total_free_bytes as *mut u64 as *mut _,
            ) == 0
            {
                return Err(std::io::Error::last_os_error());
            }

            Ok(free_bytes_available)
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = path;
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "Disk space checking is not supported on this platform",
        ))
    }
}
