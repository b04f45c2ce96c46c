use crate::command;
use crate::config::Config;
use crate::connection::{ClientState, Session};
use crate::pubsub::PubSubMessage;
use crate::resp::{RespParser, RespValue};
use crate::store::Store;
use bytes::BytesMut;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Bind and run the accept loop. Ctrl-c stops accepting and closes the store
/// (which waits for the eviction task).
pub async fn run_server(store: Arc<Store>, config: Config) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("ledis server listening on {addr}");

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = result?;
                debug!("new connection from {peer_addr}");
                let store = store.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, peer_addr.to_string(), store).await {
                        debug!("connection error from {peer_addr}: {e}");
                    }
                    debug!("connection closed: {peer_addr}");
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                store.close().await;
                return Ok(());
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: String,
    store: Arc<Store>,
) -> std::io::Result<()> {
    let (push_tx, mut push_rx) = mpsc::unbounded_channel();
    let sess = Arc::new(Session::new(peer, push_tx));
    store.tracker.register(sess.id, sess.clone());

    let (sub_id, sub_tx, mut sub_rx) = store.pubsub.new_subscriber();
    let mut client = ClientState::new(sub_id);

    let result = serve(
        &mut stream,
        &store,
        &sess,
        &mut client,
        &sub_tx,
        &mut push_rx,
        &mut sub_rx,
    )
    .await;

    // Teardown drops watch state with the session and removes the
    // connection from the observer registry and from every channel.
    store.tracker.unregister(sess.id);
    store.pubsub.unsubscribe_all(sub_id);
    result
}

async fn serve(
    stream: &mut TcpStream,
    store: &Arc<Store>,
    sess: &Arc<Session>,
    client: &mut ClientState,
    sub_tx: &mpsc::Sender<PubSubMessage>,
    push_rx: &mut mpsc::UnboundedReceiver<RespValue>,
    sub_rx: &mut mpsc::Receiver<PubSubMessage>,
) -> std::io::Result<()> {
    let mut buf = BytesMut::with_capacity(4096);

    loop {
        // Drain complete frames already buffered.
        loop {
            match RespParser::parse(&mut buf) {
                Ok(Some(frame)) => {
                    if let Some(response) =
                        process_frame(frame, store, sess, client, sub_tx).await
                    {
                        stream.write_all(&response.serialize()).await?;
                    }
                    if client.should_close {
                        return Ok(());
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    // Protocol-level failure: answer once, then close.
                    let err = RespValue::err(format!("ERR Protocol error: {e}"));
                    let _ = stream.write_all(&err.serialize()).await;
                    return Ok(());
                }
            }
        }

        tokio::select! {
            result = stream.read_buf(&mut buf) => {
                match result {
                    Ok(0) => return Ok(()),
                    Ok(_) => {}
                    Err(e) => return Err(e),
                }
            }
            Some(frame) = push_rx.recv() => {
                // Out-of-band invalidation pushes and extra confirmations.
                stream.write_all(&frame.serialize()).await?;
            }
            Some((channel, payload)) = sub_rx.recv() => {
                let msg = RespValue::Array(vec![
                    RespValue::bulk(b"message".to_vec()),
                    RespValue::bulk(channel.into_bytes()),
                    RespValue::bulk(payload),
                ]);
                stream.write_all(&msg.serialize()).await?;
            }
        }
    }
}

/// Top-level frames must be arrays of strings; element 0 names the command.
/// Returns `None` for frames that produce no reply (empty inline lines).
async fn process_frame(
    frame: RespValue,
    store: &Arc<Store>,
    sess: &Arc<Session>,
    client: &mut ClientState,
    sub_tx: &mpsc::Sender<PubSubMessage>,
) -> Option<RespValue> {
    let items = match frame {
        RespValue::Array(items) => {
            if items.is_empty() {
                return None;
            }
            items
        }
        _ => return Some(RespValue::err("ERR request must be an array of bulk strings")),
    };

    let cmd_name = match items[0].text() {
        Some(name) => name.to_uppercase(),
        None => return Some(RespValue::err("ERR invalid command name")),
    };
    let args = &items[1..];

    Some(command::dispatch(&cmd_name, args, store, sess, client, sub_tx).await)
}
