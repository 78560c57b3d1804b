//! A tiny host application with the funq hook wired in.
//!
//! Run with `FUNQ_ACTIVATION=1` (or `--force`) to install the hook. In player
//! mode every line sent to the command port is echoed back; in pick mode
//! ctrl-clicks on the synthetic widgets are logged.

use std::{process::ExitCode, time::Duration};

use clap::Parser;
use funq::{Collaborators, ConnectionHandle, PickFormatter, Picker, Player};
use funq_host::{Application, Event, EventKind, Modifiers, Object, send_event};
use tokio::{signal, task, time};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "funq-demo", about = "Instrumented demo application")]
struct Cli {
    #[command(flatten)]
    log: logging::LogArgs,

    /// Install the hook without requiring FUNQ_ACTIVATION=1
    #[arg(long)]
    force: bool,

    /// Interval between synthetic UI events, in milliseconds
    #[arg(long, default_value_t = 500)]
    tick_ms: u64,

    /// Quit after this many seconds instead of waiting for ctrl-c
    #[arg(long)]
    quit_after: Option<u64>,
}

/// Echoes complete lines back to the driver.
struct LinePlayer {
    /// Connection this player serves.
    conn: ConnectionHandle,
    /// Bytes received since the last newline.
    pending: Vec<u8>,
}

impl Player for LinePlayer {
    fn on_data(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if self.conn.send(line).is_err() {
                warn!(id = %self.conn.id(), "echo_on_closed_connection");
                return;
            }
        }
    }

    fn on_disconnected(&mut self) {
        info!(id = %self.conn.id(), peer = %self.conn.peer_addr(), "driver_disconnected");
    }
}

/// Logs ctrl-clicked widgets.
struct LogPicker {
    /// Renders the picked widget.
    formatter: Box<dyn PickFormatter>,
}

impl Picker for LogPicker {
    fn handle_event(&mut self, receiver: &dyn Object, event: &Event) {
        if event.kind() == EventKind::MouseButtonPress
            && event.modifiers().contains(Modifiers::CONTROL)
        {
            info!(picked = %self.formatter.format(receiver, event), "pick");
        }
    }
}

/// A named widget in the demo window.
struct DemoWidget {
    /// Object name.
    name: &'static str,
    /// Type name.
    class: &'static str,
}

impl Object for DemoWidget {
    fn object_name(&self) -> &str {
        self.name
    }

    fn class_name(&self) -> &str {
        self.class
    }

    fn path(&self) -> String {
        format!("MainWindow/{}", self.name)
    }
}

fn collaborators() -> Collaborators {
    Collaborators::new(
        |conn: ConnectionHandle| {
            Box::new(LinePlayer {
                conn,
                pending: Vec::new(),
            }) as Box<dyn Player>
        },
        |formatter: Box<dyn PickFormatter>| Box::new(LogPicker { formatter }) as Box<dyn Picker>,
    )
}

/// Feed a steady stream of UI events through the dispatch table.
async fn simulate_ui(tick: Duration) {
    let widgets = [
        DemoWidget {
            name: "okButton",
            class: "PushButton",
        },
        DemoWidget {
            name: "nameEdit",
            class: "LineEdit",
        },
        DemoWidget {
            name: "statusLabel",
            class: "Label",
        },
    ];
    let mut interval = time::interval(tick);
    let mut n: i32 = 0;
    loop {
        interval.tick().await;
        let w = &widgets[n as usize % widgets.len()];
        send_event(w, &Event::new(EventKind::MouseMove).with_pos(n, n));
        send_event(
            w,
            &Event::new(EventKind::MouseButtonPress)
                .with_pos(n, n)
                .with_modifiers(Modifiers::CONTROL),
        );
        send_event(w, &Event::new(EventKind::Paint));
        n = n.wrapping_add(1);
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log.spec());

    let app = match Application::new() {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "application_create_failed");
            return ExitCode::FAILURE;
        }
    };

    match funq::activate(!cli.force, collaborators()) {
        Some(funq) => info!(mode = %funq.mode(), port = funq.port(), "hook_installed"),
        None => info!("hook_not_requested"),
    }

    let handle = app.handle();
    let tick = Duration::from_millis(cli.tick_ms.max(1));
    let quit_after = cli.quit_after;
    let posted = handle.clone().post(move || {
        task::spawn_local(simulate_ui(tick));
        task::spawn_local(async move {
            match quit_after {
                Some(secs) => time::sleep(Duration::from_secs(secs)).await,
                None => {
                    if let Err(e) = signal::ctrl_c().await {
                        warn!(error = %e, "ctrl_c_unavailable");
                        return;
                    }
                }
            }
            if let Err(e) = handle.quit() {
                warn!(error = %e, "quit_failed");
            }
        });
    });
    if let Err(e) = posted {
        error!(error = %e, "startup_post_failed");
        return ExitCode::FAILURE;
    }

    app.exec();
    info!("demo_exited");
    ExitCode::SUCCESS
}
