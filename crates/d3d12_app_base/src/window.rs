use std::cell::Cell;

use eyre::WrapErr;
use tracing::error;
use tracing::info;
use tracing::warn;
use widestring::U16CString;
use windows::core::w;
use windows::core::PCWSTR;
use windows::Win32::Foundation::*;
use windows::Win32::Graphics::Gdi::HBRUSH;
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::*;

use crate::app::D3D12AppBase;
use crate::config::SampleConfig;
use crate::sample::Sample;

const WINDOW_CLASS: PCWSTR = w!("D3D12SampleWindowClass");

/// State the window procedure writes into.
#[derive(Default)]
struct WindowState {
    destroyed: Cell<bool>,
}

/// Owns the window and the state its procedure points at.
struct Window {
    hwnd: HWND,
    state: Box<WindowState>,
}

impl Drop for Window {
    fn drop(&mut self) {
        if self.state.destroyed.get() {
            return;
        }
        if let Err(e) = unsafe { DestroyWindow(self.hwnd) } {
            warn!("DestroyWindow failed: {e}");
        }
    }
}

/// Creates a window for `S`, runs it until the window closes, then tears the
/// sample down before the base application.
pub fn run_sample<S: Sample>(config: &SampleConfig) -> eyre::Result<()> {
    config.validate()?;

    let instance = unsafe { GetModuleHandleW(None) }.wrap_err("GetModuleHandleW")?;

    let wc = WNDCLASSEXW {
        cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
        style: CS_HREDRAW | CS_VREDRAW,
        lpfnWndProc: Some(wndproc),
        hInstance: instance.into(),
        hCursor: unsafe { LoadCursorW(None, IDC_ARROW) }.wrap_err("LoadCursorW")?,
        lpszClassName: WINDOW_CLASS,
        hbrBackground: HBRUSH::default(),
        ..Default::default()
    };
    let atom = unsafe { RegisterClassExW(&wc) };
    if atom == 0 {
        return Err(windows::core::Error::from_win32()).wrap_err("RegisterClassExW");
    }

    let style = WS_OVERLAPPEDWINDOW & !WS_SIZEBOX & !WS_MAXIMIZEBOX;
    let mut window_rect = RECT {
        left: 0,
        top: 0,
        right: config.width as i32,
        bottom: config.height as i32,
    };
    unsafe { AdjustWindowRect(&mut window_rect, style, false) }.wrap_err("AdjustWindowRect")?;

    let title = U16CString::from_str(config.window_title(S::title()))
        .wrap_err("window title contains a NUL")?;

    let state = Box::new(WindowState::default());
    let hwnd = unsafe {
        CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            WINDOW_CLASS,
            PCWSTR(title.as_ptr()),
            style,
            CW_USEDEFAULT,
            CW_USEDEFAULT,
            window_rect.right - window_rect.left,
            window_rect.bottom - window_rect.top,
            None,
            None,
            Some(instance.into()),
            Some(&*state as *const WindowState as _),
        )
    }
    .wrap_err("CreateWindowExW")?;
    let window = Window { hwnd, state };

    let mut base = D3D12AppBase::new(config, window.hwnd)?;
    let mut sample = match S::setup(&mut base.setup_context()) {
        Ok(sample) => sample,
        Err(e) => {
            base.log_debug_messages();
            return Err(e).wrap_err_with(|| format!("setting up {}", S::title()));
        }
    };
    info!("{} ready", S::title());

    unsafe { _ = ShowWindow(window.hwnd, SW_SHOW) };

    let result = message_loop(&mut base, &mut sample);
    if result.is_err() {
        base.log_debug_messages();
    }

    sample.cleanup();
    let idle = base.wait_for_idle();
    // The GPU may still reference the sample's resources until idle.
    drop(sample);
    drop(base);
    drop(window);

    info!("Exiting after teardown");
    result.and(idle)
}

fn message_loop<S: Sample>(base: &mut D3D12AppBase, sample: &mut S) -> eyre::Result<()> {
    loop {
        let mut message = MSG::default();
        if unsafe { PeekMessageW(&mut message, None, 0, 0, PM_REMOVE) }.into() {
            unsafe {
                _ = TranslateMessage(&message);
                DispatchMessageW(&message);
            }
            if message.message == WM_QUIT {
                return Ok(());
            }
        } else if let Err(e) = base.render(sample) {
            error!("Render failed on frame {}: {e:#}", base.frame_number());
            return Err(e);
        }
    }
}

extern "system" fn wndproc(window: HWND, message: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if message == WM_CREATE {
        unsafe {
            let create_struct: &CREATESTRUCTW = &*(lparam.0 as *const CREATESTRUCTW);
            SetWindowLongPtrW(window, GWLP_USERDATA, create_struct.lpCreateParams as _);
        }
        return LRESULT(0);
    }

    let user_data = unsafe { GetWindowLongPtrW(window, GWLP_USERDATA) };
    let Some(state) = std::ptr::NonNull::<WindowState>::new(user_data as *mut WindowState) else {
        // Messages before WM_CREATE or after WM_DESTROY.
        return unsafe { DefWindowProcW(window, message, wparam, lparam) };
    };

    match message {
        WM_DESTROY => {
            unsafe { state.as_ref() }.destroyed.set(true);
            unsafe {
                SetWindowLongPtrW(window, GWLP_USERDATA, 0);
                PostQuitMessage(0);
            }
            LRESULT(0)
        }
        _ => unsafe { DefWindowProcW(window, message, wparam, lparam) },
    }
}
