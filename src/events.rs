use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use tokio::runtime::Handle;

use fleetview::api::ApiClient;
use fleetview::app::{Command, Outcome};
use fleetview::executor;

/// Unified application event.
#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    /// A network command finished.
    Outcome(Outcome),
    Tick,
    /// Time for a periodic topology/agents refresh.
    Poll,
}

/// Spawn a thread that polls crossterm key events and sends them to the channel.
pub fn spawn_key_reader(tx: mpsc::Sender<AppEvent>) {
    std::thread::spawn(move || loop {
        if event::poll(Duration::from_millis(50)).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if tx.send(AppEvent::Key(key)).is_err() {
                    break;
                }
            }
        }
    });
}

/// Spawn a timer thread that sends `make()` at the given interval.
pub fn spawn_timer(tx: mpsc::Sender<AppEvent>, interval: Duration, make: fn() -> AppEvent) {
    std::thread::spawn(move || loop {
        std::thread::sleep(interval);
        if tx.send(make()).is_err() {
            break;
        }
    });
}

/// Run each command as its own task; outcomes come back as events in
/// completion order.
pub fn spawn_commands(
    runtime: &Handle,
    client: &ApiClient,
    tx: &mpsc::Sender<AppEvent>,
    commands: Vec<Command>,
) {
    for command in commands {
        let client = client.clone();
        let tx = tx.clone();
        runtime.spawn(async move {
            let outcome = executor::execute(&client, command).await;
            let _ = tx.send(AppEvent::Outcome(outcome));
        });
    }
}
