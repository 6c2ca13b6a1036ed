//! Interactive chat session against one room.

use std::sync::Arc;

use roomsync_shared::time::{current_timestamp_millis, timestamp_to_iso8601};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use crate::{
    actions::Action,
    api::SendTextChatMessage,
    config::DriverConfig,
    driver::SyncDriver,
};

use super::{formatter::MessageFormatter, ui::redisplay_prompt};

/// Run the chat session until the user exits (Ctrl+C / Ctrl+D).
///
/// Reconnection is handled by the driver; the session only ends on user
/// request or when the driver stops.
pub async fn run_client_session(
    config: DriverConfig,
    room: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (actions_tx, mut actions_rx) = mpsc::unbounded_channel::<Action>();
    let driver = SyncDriver::builder(config)
        .dispatcher(Arc::new(actions_tx))
        .build()?;
    driver.connect_to_room(room)?;

    println!(
        "\nJoined room '{}'. Type messages and press Enter to send. Press Ctrl+C to exit.\n",
        room
    );

    // Create channel for rustyline input
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();

    // rustyline is blocking, so it gets its own thread
    let prompt = format!("{}> ", room);
    let _readline_handle = std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            action = actions_rx.recv() => {
                let Some(action) = action else {
                    tracing::info!("Driver stopped");
                    break;
                };
                match action {
                    Action::ReceivedTextChatMessage(message) => {
                        print!("{}", MessageFormatter::format_chat_message(&message));
                    }
                    Action::DataChannelsAvailable(status) => {
                        print!("{}", MessageFormatter::format_channel_status(status.available));
                    }
                    other => tracing::debug!("Ignoring action {:?}", other),
                }
                redisplay_prompt(room);
            }
            line = input_rx.recv() => {
                let Some(line) = line else {
                    break;
                };
                let sent_timestamp = timestamp_to_iso8601(current_timestamp_millis());
                let message = SendTextChatMessage {
                    sent_timestamp: Some(sent_timestamp.clone()),
                    ..SendTextChatMessage::text(line)
                };
                match driver.send_text_chat_message(&message).await {
                    Ok(key) => {
                        print!("{}", MessageFormatter::format_sent_confirmation(&key, &sent_timestamp));
                    }
                    Err(e) => tracing::warn!("Failed to send message ({}): {}", e.name(), e),
                }
                redisplay_prompt(room);
            }
        }
    }

    driver.disconnect()?;
    Ok(())
}
