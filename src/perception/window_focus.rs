/// Window focus by title for the anchor restorer.
///
/// On Windows this walks top-level windows with `EnumWindows`; elsewhere it
/// falls back to [`NullWindowService`](crate::perception::traits::NullWindowService).
use std::sync::Arc;

use crate::perception::traits::WindowService;

#[cfg(target_os = "windows")]
mod win {
    use crate::errors::{TrigWatchError, TrigWatchResult};
    use crate::perception::traits::WindowService;
    use windows::Win32::Foundation::{BOOL, HWND, LPARAM};
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetWindowTextW, IsIconic, IsWindowVisible, SetForegroundWindow, ShowWindow, SW_RESTORE,
    };

    struct Search {
        needle: String,
        found: Option<HWND>,
    }

    unsafe extern "system" fn visit(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let search = &mut *(lparam.0 as *mut Search);
        if search.found.is_some() || !IsWindowVisible(hwnd).as_bool() {
            return BOOL(1);
        }
        let mut buf = [0u16; 512];
        let len = GetWindowTextW(hwnd, &mut buf);
        if len > 0 {
            let title = String::from_utf16_lossy(&buf[..len as usize]).to_lowercase();
            if title.contains(&search.needle) {
                search.found = Some(hwnd);
            }
        }
        BOOL(1)
    }

    pub struct Win32WindowService;

    impl WindowService for Win32WindowService {
        fn focus_by_title(&self, title: &str) -> TrigWatchResult<bool> {
            let mut search = Search {
                needle: title.to_lowercase(),
                found: None,
            };
            unsafe {
                EnumWindows(Some(visit), LPARAM(&mut search as *mut Search as isize))
                    .map_err(|e| TrigWatchError::Perception(format!("EnumWindows: {e}")))?;
            }
            let Some(hwnd) = search.found else {
                return Ok(false);
            };
            unsafe {
                if IsIconic(hwnd).as_bool() {
                    let _ = ShowWindow(hwnd, SW_RESTORE);
                }
                let _ = SetForegroundWindow(hwnd);
            }
            tracing::debug!(title = %title, "window focused");
            Ok(true)
        }
    }
}

/// The window service for the current platform.
pub fn platform_window_service() -> Arc<dyn WindowService> {
    #[cfg(target_os = "windows")]
    {
        Arc::new(win::Win32WindowService)
    }
    #[cfg(not(target_os = "windows"))]
    {
        Arc::new(crate::perception::traits::NullWindowService)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn other_platforms_report_nothing_focused() {
        let service = platform_window_service();
        assert!(!service.focus_by_title("anything").unwrap());
    }
}
