//! The network front-end: accepts sockets, walks the handshake, status and
//! login states, then hands fully-joined sessions to the tick thread through
//! the join queue. Protocol errors terminate the connection with no message;
//! the world never sees them.

use std::sync::Arc;
use std::time::Duration;

use ember_core::core::PlayerListSnapshot;
use ember_core::player::{JoinQueue, JoinRequest, MAX_RENDER_DISTANCE};
use ember_protocol::frame::{CompressionSettings, decode_frame, encode_frame};
use ember_protocol::packets::serverbound::ServerboundPacket;
use ember_protocol::ser::{ReadFrom, VarInt, WriteTo};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use uuid::Uuid;

/// Idle limit for a connection that has not joined yet.
const INITIAL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Supported protocol version (1.19.2).
pub const PROTOCOL_VERSION: i32 = 760;
/// Game version reported in the status.
pub const GAME_VERSION: &str = "1.19.2";

/// Shared context for connection tasks.
#[allow(missing_docs)]
pub struct NetworkContext {
    pub join_queue: Arc<JoinQueue>,
    pub player_list: PlayerListSnapshot,
    pub max_players: i32,
    pub view_distance_cap: i32,
    pub motd: String,
    pub compression: Option<CompressionSettings>,
}

/// Accept loop; runs on the network runtime until the process exits.
pub async fn run_listener(listener: TcpListener, context: Arc<NetworkContext>) {
    loop {
        let Ok((stream, address)) = listener.accept().await else {
            continue;
        };
        if let Err(error) = stream.set_nodelay(true) {
            log::warn!("Failed to set TCP_NODELAY: {error}");
        }
        log::debug!("Accepted connection from {address}");
        let context = Arc::clone(&context);
        tokio::spawn(async move {
            let result = tokio::time::timeout(
                INITIAL_CONNECTION_TIMEOUT,
                handle_connection(stream, context),
            )
            .await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(error)) => log::debug!("Connection {address} closed: {error}"),
                Err(_) => log::debug!("Connection {address} timed out"),
            }
        });
    }
}

/// A framed connection during the pre-join states.
struct Connection {
    stream: TcpStream,
    buffer: Vec<u8>,
    compression: Option<CompressionSettings>,
}

impl Connection {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            buffer: Vec::with_capacity(4096),
            compression: None,
        }
    }

    async fn read_packet(&mut self) -> anyhow::Result<Vec<u8>> {
        loop {
            if let Some((payload, consumed)) = decode_frame(&self.buffer, self.compression)? {
                self.buffer.drain(..consumed);
                return Ok(payload);
            }
            let mut chunk = [0u8; 4096];
            let read = self.stream.read(&mut chunk).await?;
            if read == 0 {
                anyhow::bail!("connection closed");
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
    }

    async fn write_packet(&mut self, id: i32, body: &[u8]) -> anyhow::Result<()> {
        let mut payload = Vec::with_capacity(body.len() + 2);
        VarInt(id).write(&mut payload)?;
        payload.extend_from_slice(body);
        let frame = encode_frame(&payload, self.compression)?;
        self.stream.write_all(&frame).await?;
        Ok(())
    }
}

async fn handle_connection(stream: TcpStream, context: Arc<NetworkContext>) -> anyhow::Result<()> {
    let mut connection = Connection::new(stream);

    // Handshake.
    let payload = connection.read_packet().await?;
    let mut reader = std::io::Cursor::new(payload.as_slice());
    let packet_id = VarInt::read(&mut reader)?.0;
    anyhow::ensure!(packet_id == 0x00, "expected handshake");
    let _protocol = VarInt::read(&mut reader)?.0;
    let _address = String::read(&mut reader)?;
    let _port = u16::read(&mut reader)?;
    let next_state = VarInt::read(&mut reader)?.0;

    match next_state {
        1 => handle_status(&mut connection, &context).await,
        2 => handle_login(connection, context).await,
        other => anyhow::bail!("invalid next state {other}"),
    }
}

async fn handle_status(
    connection: &mut Connection,
    context: &NetworkContext,
) -> anyhow::Result<()> {
    loop {
        let payload = connection.read_packet().await?;
        let mut reader = std::io::Cursor::new(payload.as_slice());
        match VarInt::read(&mut reader)?.0 {
            0x00 => {
                let players: Vec<serde_json::Value> = context
                    .player_list
                    .read()
                    .iter()
                    .map(|entry| {
                        serde_json::json!({
                            "name": entry.name,
                            "id": entry.uuid.to_string(),
                        })
                    })
                    .collect();
                let status = serde_json::json!({
                    "version": { "name": GAME_VERSION, "protocol": PROTOCOL_VERSION },
                    "players": {
                        "max": context.max_players,
                        "online": players.len(),
                        "sample": players,
                    },
                    "description": { "text": context.motd },
                });
                let mut body = Vec::new();
                status.to_string().write(&mut body)?;
                connection.write_packet(0x00, &body).await?;
            }
            0x01 => {
                let echo = i64::read(&mut reader)?;
                let mut body = Vec::new();
                echo.write(&mut body)?;
                connection.write_packet(0x01, &body).await?;
                return Ok(());
            }
            other => anyhow::bail!("unexpected status packet {other}"),
        }
    }
}

/// Offline-mode UUID: version-3 hash of the offline player name.
fn offline_uuid(username: &str) -> Uuid {
    let digest = md5::compute(format!("OfflinePlayer:{username}"));
    let mut bytes = digest.0;
    bytes[6] = (bytes[6] & 0x0F) | 0x30;
    bytes[8] = (bytes[8] & 0x3F) | 0x80;
    Uuid::from_bytes(bytes)
}

async fn handle_login(
    mut connection: Connection,
    context: Arc<NetworkContext>,
) -> anyhow::Result<()> {
    let payload = connection.read_packet().await?;
    let mut reader = std::io::Cursor::new(payload.as_slice());
    anyhow::ensure!(VarInt::read(&mut reader)?.0 == 0x00, "expected hello");
    let username = String::read(&mut reader)?;
    anyhow::ensure!(
        !username.is_empty() && username.len() <= 16,
        "bad username length"
    );
    let uuid = offline_uuid(&username);

    if context.player_list.read().len() >= context.max_players as usize {
        // No disconnect message; the session never reached play.
        anyhow::bail!("server full");
    }

    if let Some(compression) = context.compression {
        let mut body = Vec::new();
        VarInt(compression.threshold as i32).write(&mut body)?;
        connection.write_packet(0x03, &body).await?;
        connection.compression = Some(compression);
    }

    // Login success: uuid, name, no profile properties.
    let mut body = Vec::new();
    uuid.write(&mut body)?;
    username.write(&mut body)?;
    VarInt(0).write(&mut body)?;
    connection.write_packet(0x02, &body).await?;

    transfer_to_tick_thread(connection, context, uuid, username)
}

/// Splits the socket into reader/writer tasks and queues the join request.
fn transfer_to_tick_thread(
    connection: Connection,
    context: Arc<NetworkContext>,
    uuid: Uuid,
    username: String,
) -> anyhow::Result<()> {
    let Connection {
        stream,
        buffer,
        compression,
    } = connection;
    let (read_half, write_half) = stream.into_split();

    let (outbound_tx, outbound_rx) = tokio::sync::mpsc::unbounded_channel::<Vec<u8>>();
    let (inbound_tx, inbound_rx) = tokio::sync::mpsc::unbounded_channel::<ServerboundPacket>();

    tokio::spawn(run_writer(write_half, outbound_rx));
    tokio::spawn(run_reader(read_half, buffer, compression, inbound_tx));

    let request = JoinRequest {
        uuid,
        username,
        locale: "en_us".to_owned(),
        view_distance: context.view_distance_cap.min(MAX_RENDER_DISTANCE),
        compression,
        outbound: outbound_tx,
        inbound: inbound_rx,
    };
    if context.join_queue.push(request).is_err() {
        anyhow::bail!("join queue full");
    }
    Ok(())
}

async fn run_writer(
    mut write_half: OwnedWriteHalf,
    mut outbound: tokio::sync::mpsc::UnboundedReceiver<Vec<u8>>,
) {
    while let Some(frame) = outbound.recv().await {
        if write_half.write_all(&frame).await.is_err() {
            return;
        }
    }
}

async fn run_reader(
    mut read_half: OwnedReadHalf,
    mut buffer: Vec<u8>,
    compression: Option<CompressionSettings>,
    inbound: tokio::sync::mpsc::UnboundedSender<ServerboundPacket>,
) {
    loop {
        match decode_frame(&buffer, compression) {
            Ok(Some((payload, consumed))) => {
                buffer.drain(..consumed);
                let Ok(packet) = ServerboundPacket::decode(&payload) else {
                    return;
                };
                if inbound.send(packet).is_err() {
                    return;
                }
                continue;
            }
            Ok(None) => {}
            Err(_) => return,
        }
        let mut chunk = [0u8; 8192];
        match read_half.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(read) => buffer.extend_from_slice(&chunk[..read]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_uuid_is_stable_and_versioned() {
        let a = offline_uuid("Steve");
        let b = offline_uuid("Steve");
        let c = offline_uuid("Alex");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.get_version_num(), 3);
    }
}
