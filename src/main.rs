// Demo host: one top-level window whose messages run through a `WindowHost`,
// a background thread that queries it across threads, and the shutdown sweep
// armed for the life of `main`.

// Release builds run as a GUI application (no console window).
// Debug builds keep the console so that log output is visible.
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

#[cfg(windows)]
fn main() {
    if let Err(e) = demo::run() {
        log::error!("{e}");
        // Startup failed before or during the message loop.  Show a modal
        // error dialog: the only safe output path in a GUI app.
        hwnd_subclass::platform::win32::message_loop::show_error_dialog(&e.to_string());
        std::process::exit(1);
    }
}

#[cfg(not(windows))]
fn main() {
    eprintln!("hwnd-host-demo only runs on Windows");
    std::process::exit(1);
}

#[cfg(windows)]
mod demo {
    use std::{fs, sync::Arc, thread};

    use hwnd_subclass::{
        config::{self, Settings},
        platform::{
            messages::{WM_DESTROY, WS_OVERLAPPEDWINDOW, WS_VISIBLE},
            win32::message_loop,
            Message,
        },
        HostParameters, Interop, Result, WindowHook, WindowHost,
    };
    use log::{debug, info, warn};
    use simplelog::{
        ColorChoice, CombinedLogger, SharedLogger, TermLogger, TerminalMode, WriteLogger,
    };

    pub(super) fn run() -> Result<()> {
        start_logger(&config::load());

        let interop = Interop::global()?;
        // Everything still subclassed when `main` unwinds is rewired here.
        let _sweep = interop.registry().shutdown_guard();

        let queue = message_loop::queue_for_current_thread();
        let quit_on_destroy: Arc<dyn WindowHook> =
            Arc::new(|message: &Message, _handled: &mut bool| -> isize {
                if message.msg == WM_DESTROY {
                    message_loop::quit(0);
                }
                0
            });
        let log_messages: Arc<dyn WindowHook> =
            Arc::new(|message: &Message, _handled: &mut bool| -> isize {
                debug!("{:?} <- {:#06x}", message.hwnd, message.msg);
                0
            });
        let params = HostParameters {
            title: "Window host demo".to_owned(),
            style: WS_OVERLAPPEDWINDOW | WS_VISIBLE,
            ..HostParameters::default()
        };
        let host = WindowHost::new(
            &interop,
            queue.clone(),
            &params,
            &[log_messages.clone(), quit_on_destroy.clone()],
        )?;
        host.on_disposed(|| info!("host disposed"));

        if let Some(hwnd) = host.handle() {
            let remote = interop.clone();
            thread::spawn(move || {
                let query = Message::new(hwnd, remote.memory_usage_message(), 0, 0);
                match remote.api().send_message(query) {
                    Ok(bytes) => info!("working set reported by {hwnd:?}: {bytes} bytes"),
                    Err(e) => warn!("memory query failed: {e}"),
                }
            });
        }

        let code = message_loop::run(&queue)?;
        host.dispose();
        info!("message loop exited with code {code}");
        Ok(())
    }

    /// Terminal logger always; file logger too when the settings name a file.
    fn start_logger(settings: &Settings) {
        let level = settings.level_filter();
        let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
            level,
            simplelog::Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        )];
        if let Some(path) = &settings.log_file {
            let file = path
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|()| fs::OpenOptions::new().create(true).append(true).open(path));
            match file {
                Ok(file) => loggers.push(WriteLogger::new(level, simplelog::Config::default(), file)),
                Err(e) => eprintln!("cannot open log file {}: {e}", path.display()),
            }
        }
        // Only fails if a logger is already installed.
        let _ = CombinedLogger::init(loggers);
    }
}
