// `livedraft watch` — join a document room and stream its activity.

use anyhow::{bail, Context, Result};
use clap::Args;
use uuid::Uuid;

use livedraft_client::config::ClientConfig;
use livedraft_client::connection::{ClientIdentity, ConnectionManager, ConnectionState};
use livedraft_client::reducer::RoomEvent;
use livedraft_client::session::SyncClient;
use livedraft_client::transport::WsTransport;
use livedraft_common::text::Operation;

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Document to join.
    doc_id: String,

    /// Bus URL override (defaults to the configured bus_url).
    #[arg(long)]
    bus_url: Option<String>,

    /// Display name override.
    #[arg(long)]
    name: Option<String>,
}

pub fn run(args: WatchArgs) -> Result<()> {
    let config = ClientConfig::load();
    let bus_url = args
        .bus_url
        .or(config.bus_url)
        .context("no bus URL configured; pass --bus-url or set bus_url in ~/.livedraft/config.toml")?;
    let display_name =
        args.name.or(config.display_name).unwrap_or_else(|| "anonymous".to_string());

    let identity = ClientIdentity { user_id: Uuid::new_v4().to_string(), display_name };
    let transport = WsTransport::new()?;
    let connection = ConnectionManager::new(bus_url, identity, transport);
    let mut client = SyncClient::new(connection)
        .with_presence_interval_ms(config.presence_interval_ms);

    if client.connect()? != ConnectionState::Connected {
        bail!("could not connect to the message bus");
    }
    client.join_document(&args.doc_id)?;

    let _updates = client.on_room_update(|update| match &update.event {
        RoomEvent::ParticipantJoined { participant } => {
            println!("+ {} joined", participant.username);
        }
        RoomEvent::ParticipantLeft { user_id } => {
            println!("- {user_id} left");
        }
        RoomEvent::OperationApplied { user_id, operation } => match operation {
            Operation::Insert { position, content } => {
                println!("~ {user_id} inserted {:?} at {position}", content);
            }
            Operation::Delete { position, length } => {
                println!("~ {user_id} deleted {length} chars at {position}");
            }
        },
        RoomEvent::CursorUpdated { user_id, position } => {
            println!("@ {user_id} at {}:{}", position.line, position.column);
        }
        _ => {}
    });

    let _errors = client.on_room_error(|error| {
        eprintln!("! {}", error.message);
    });

    while client.pump()? {}
    println!("connection closed");
    Ok(())
}
