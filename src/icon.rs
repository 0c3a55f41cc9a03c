use std::sync::LazyLock;

use image::{Rgba, RgbaImage};
use voxclip_core::SessionStatus;

const ICON_SIZE: u32 = 32;
const COLOR_IDLE: (u8, u8, u8) = (142, 142, 147);
const COLOR_RECORDING: (u8, u8, u8) = (255, 59, 48);
const COLOR_PAUSED: (u8, u8, u8) = (255, 149, 0);

static ICON_IDLE: LazyLock<tray_icon::Icon> = LazyLock::new(|| load_icon(COLOR_IDLE));
static ICON_RECORDING: LazyLock<tray_icon::Icon> = LazyLock::new(|| load_icon(COLOR_RECORDING));
static ICON_PAUSED: LazyLock<tray_icon::Icon> = LazyLock::new(|| load_icon(COLOR_PAUSED));

/// Tray icon for a session status: a grey dot when idle, red while
/// recording, orange while paused.
pub fn status_icon(status: SessionStatus) -> tray_icon::Icon {
    match status {
        SessionStatus::Recording => ICON_RECORDING.clone(),
        SessionStatus::Paused => ICON_PAUSED.clone(),
        SessionStatus::Idle | SessionStatus::Stopped => ICON_IDLE.clone(),
    }
}

fn load_icon(color: (u8, u8, u8)) -> tray_icon::Icon {
    let image = draw_dot(color);
    let (width, height) = image.dimensions();
    tray_icon::Icon::from_rgba(image.into_raw(), width, height).expect("Failed to build icon")
}

fn draw_dot((r, g, b): (u8, u8, u8)) -> RgbaImage {
    let center = (ICON_SIZE as f32 - 1.0) / 2.0;
    let radius = ICON_SIZE as f32 * 0.4;
    RgbaImage::from_fn(ICON_SIZE, ICON_SIZE, |x, y| {
        let dx = x as f32 - center;
        let dy = y as f32 - center;
        if dx * dx + dy * dy <= radius * radius {
            Rgba([r, g, b, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}
