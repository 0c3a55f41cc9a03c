use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use arboard::Clipboard;
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use tao::event::{Event, StartCause};
use tao::event_loop::{ControlFlow, EventLoop, EventLoopBuilder};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tray_icon::menu::{AboutMetadataBuilder, Menu, MenuEvent, MenuItem, PredefinedMenuItem};
use tray_icon::{TrayIconBuilder, TrayIconEvent};
use voxclip::config_ext::ConfigExt;
use voxclip::event::{ProxySink, VoxclipEvent};
use voxclip::icon::status_icon;
use voxclip::notify::NotificationLayer;
use voxclip::upload::UploadPipeline;
use voxclip::widget::{Action, View, Widget};
use voxclip::{
    APP_NAME_PRETTY, ConfigManager, CpalInput, CpalOutput, DEFAULT_LOG_LEVEL, PlaybackStatus,
    SessionStatus, VERSION,
};

const ACTIONS: [Action; 8] = [
    Action::StartRecording,
    Action::PauseRecording,
    Action::ResumeRecording,
    Action::StopRecording,
    Action::Play,
    Action::PausePlayback,
    Action::StopPlayback,
    Action::Upload,
];

fn action_label(action: Action) -> &'static str {
    match action {
        Action::StartRecording => "Start Recording",
        Action::StopRecording => "Stop Recording",
        Action::PauseRecording => "Pause Recording",
        Action::ResumeRecording => "Resume Recording",
        Action::Upload => "Upload",
        Action::Play => "Play",
        Action::PausePlayback => "Pause",
        Action::StopPlayback => "Stop",
    }
}

fn tooltip(view: &View) -> String {
    let status = match view.status {
        SessionStatus::Idle => "idle",
        SessionStatus::Recording => "recording",
        SessionStatus::Paused => "paused",
        SessionStatus::Stopped => "recording ready",
    };
    match &view.recording_time {
        Some(time) => format!("{} - {} ({})", APP_NAME_PRETTY, status, time),
        None => format!("{} - {}", APP_NAME_PRETTY, status),
    }
}

fn main() -> Result<()> {
    // Initialize the logger
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("VOXCLIP_LOG")
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL)),
        )
        .finish()
        .with(NotificationLayer::new())
        .init();

    // Load config
    let config_manager = ConfigManager::new()?;
    let config = config_manager.load()?;
    // save back the config to create the file if it doesn't exist
    config_manager.save(&config)?;

    // Set up hotkey
    let hotkey = config.hotkey();
    let hotkey_manager = GlobalHotKeyManager::new().context("Failed to create hotkey manager")?;
    hotkey_manager
        .register(hotkey)
        .context("Failed to register hotkey")?;

    let mut clipboard = Clipboard::new()?;

    // Create the tray menu
    let tray_menu = Menu::new();
    let status_item = MenuItem::new("Idle", false, None);
    let error_item = MenuItem::new("", false, None);
    let action_items: Vec<(Action, MenuItem)> = ACTIONS
        .iter()
        .map(|&action| (action, MenuItem::new(action_label(action), false, None)))
        .collect();
    let icon_quit = MenuItem::new("Quit", true, None);
    let icon_copy_config = MenuItem::new("Copy config path", true, None);

    tray_menu.append_items(&[
        // the name of the app
        &MenuItem::new(APP_NAME_PRETTY, false, None),
        &status_item,
        &error_item,
        &PredefinedMenuItem::separator(),
    ])?;
    for (_, item) in &action_items {
        tray_menu.append(item)?;
    }
    tray_menu.append_items(&[
        &PredefinedMenuItem::separator(),
        &PredefinedMenuItem::about(
            None,
            Some(
                AboutMetadataBuilder::new()
                    .version(Some(VERSION.to_owned()))
                    .build(),
            ),
        ),
        &icon_copy_config,
        &PredefinedMenuItem::separator(),
        &icon_quit,
    ])?;

    // Set up the event loop
    let mut icon_tray = None;

    let menu_channel = MenuEvent::receiver();
    let tray_channel = TrayIconEvent::receiver();
    let hotkey_channel = GlobalHotKeyEvent::receiver();

    let event_loop: EventLoop<VoxclipEvent> = EventLoopBuilder::with_user_event().build();
    let event_sender = event_loop.create_proxy();

    // Uploads run on their own runtime and report back through the proxy
    let upload_pipeline = UploadPipeline::from_config(&config, event_sender.clone())?;

    let mut widget = Widget::new(
        Box::new(CpalInput::new(
            config.input_device().map(str::to_owned),
            config.chunk_interval(),
        )),
        Box::new(CpalOutput::new()),
        Arc::new(ProxySink::new(event_sender)),
    );
    let mut last_view: Option<View> = None;

    event_loop.run(move |event, _, control_flow| {
        let now = Instant::now();

        match event {
            Event::NewEvents(StartCause::Init) => {
                // We create the icon once the event loop is actually running
                // to prevent issues like https://github.com/tauri-apps/tray-icon/issues/90
                match TrayIconBuilder::new()
                    .with_menu(Box::new(tray_menu.clone()))
                    .with_tooltip(format!("{} - idle", APP_NAME_PRETTY))
                    .with_icon(status_icon(SessionStatus::Idle))
                    .build()
                {
                    Ok(tray) => {
                        icon_tray.replace(tray);
                    }
                    Err(e) => {
                        error!("Failed to create tray icon: {}", e);
                        *control_flow = ControlFlow::Exit;
                        return;
                    }
                }

                // We have to request a redraw here to have the icon actually show up.
                // Tao only exposes a redraw method on the Window so we use core-foundation directly.
                #[cfg(target_os = "macos")]
                unsafe {
                    use core_foundation::runloop::{CFRunLoopGetMain, CFRunLoopWakeUp};

                    let rl = CFRunLoopGetMain();
                    CFRunLoopWakeUp(rl);
                }

                info!("Voxclip ready");
            }
            // Woken early by another event the deadline may still have passed
            Event::NewEvents(
                StartCause::ResumeTimeReached { .. } | StartCause::WaitCancelled { .. },
            ) => {
                widget.tick(now);
            }
            // Handle user provided events
            Event::UserEvent(VoxclipEvent::Audio(event)) => {
                widget.handle_event(event);
            }
            Event::UserEvent(VoxclipEvent::UploadFinished(outcome)) => {
                widget.on_upload_finished(outcome);
            }
            _ => {}
        }

        if let Ok(event) = menu_channel.try_recv() {
            if event.id == icon_quit.id() {
                icon_tray.take();
                *control_flow = ControlFlow::Exit;
                return;
            } else if event.id == icon_copy_config.id() {
                if let Err(e) =
                    clipboard.set_text(config_manager.config_path().to_string_lossy().into_owned())
                {
                    error!("Failed to copy config path to clipboard: {}", e);
                }
            } else if let Some((action, _)) =
                action_items.iter().find(|(_, item)| event.id == *item.id())
            {
                if let Some(request) = widget.apply(*action, now) {
                    upload_pipeline.submit(request);
                }
            }
        }

        // Drain tray icon events, the menu covers all interaction
        while tray_channel.try_recv().is_ok() {}

        // Handle hotkey events
        if let Ok(event) = hotkey_channel.try_recv() {
            if event.id() == hotkey.id() && event.state() == HotKeyState::Pressed {
                let action = if widget.status().is_live() {
                    Action::StopRecording
                } else {
                    Action::StartRecording
                };
                widget.apply(action, now);
            }
        }

        // Refresh the tray only when something visible changed
        let view = widget.view();
        if last_view.as_ref() != Some(&view) {
            status_item.set_text(match &view.recording_time {
                Some(time) => time.clone(),
                None => match view.playback {
                    Some(PlaybackStatus::Playing) => "Playing".to_string(),
                    Some(PlaybackStatus::Paused) => "Playback paused".to_string(),
                    Some(PlaybackStatus::Stopped) => "Recording ready".to_string(),
                    None => "Idle".to_string(),
                },
            });
            error_item.set_text(view.error.as_deref().unwrap_or(""));
            for (action, item) in &action_items {
                item.set_enabled(view.controls.enabled(*action));
            }
            if let Some(tray) = icon_tray.as_ref() {
                if last_view.as_ref().map(|v| v.status) != Some(view.status) {
                    tray.set_icon(Some(status_icon(view.status))).ok();
                }
                tray.set_tooltip(Some(tooltip(&view))).ok();
            }
            last_view = Some(view);
        }

        *control_flow = match widget.next_deadline() {
            Some(deadline) => ControlFlow::WaitUntil(deadline),
            None => ControlFlow::Wait,
        };
    });
}
