use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use windows::Win32::Graphics::Dxgi::*;

/// Drains the DXGI info queue into the log. Does nothing without the debug layer.
pub fn log_dxgi_debug_messages(info_queue: &Option<IDXGIInfoQueue>) {
    let Some(queue) = info_queue else {
        debug!("DXGI info queue not available");
        return;
    };

    let count = unsafe { queue.GetNumStoredMessages(DXGI_DEBUG_ALL) };
    for i in 0..count {
        let mut size: usize = 0;
        if unsafe { queue.GetMessage(DXGI_DEBUG_ALL, i, None, &mut size) }.is_err() {
            warn!("Could not size DXGI message {i}");
            continue;
        }

        // u64 backing keeps the message header aligned.
        let mut buffer = vec![0u64; size.div_ceil(8)];
        let message = buffer.as_mut_ptr() as *mut DXGI_INFO_QUEUE_MESSAGE;
        if unsafe { queue.GetMessage(DXGI_DEBUG_ALL, i, Some(message), &mut size) }.is_err() {
            warn!("Could not read DXGI message {i}");
            continue;
        }

        let (severity, id, description) = unsafe {
            let message = &*message;
            let bytes = std::slice::from_raw_parts(
                message.pDescription as *const u8,
                message.DescriptionByteLength,
            );
            (
                message.Severity,
                message.ID,
                String::from_utf8_lossy(bytes)
                    .trim_end_matches('\0')
                    .trim()
                    .to_string(),
            )
        };

        match severity {
            DXGI_INFO_QUEUE_MESSAGE_SEVERITY_CORRUPTION | DXGI_INFO_QUEUE_MESSAGE_SEVERITY_ERROR => {
                error!("DXGI [{id}]: {description}")
            }
            DXGI_INFO_QUEUE_MESSAGE_SEVERITY_WARNING => warn!("DXGI [{id}]: {description}"),
            _ => info!("DXGI [{id}]: {description}"),
        }
    }
    unsafe { queue.ClearStoredMessages(DXGI_DEBUG_ALL) };
}
