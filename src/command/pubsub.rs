use super::{arg_to_bytes, arg_to_string, resp_err, wrong_arg_count};
use crate::connection::{ClientState, Session};
use crate::error::LedisError;
use crate::pubsub::PubSubMessage;
use crate::resp::RespValue;
use crate::store::Store;
use tokio::sync::mpsc;

pub fn cmd_publish(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() != 2 {
        return wrong_arg_count("publish");
    }
    let (channel, payload) = match (arg_to_string(&args[0]), arg_to_bytes(&args[1])) {
        (Some(c), Some(p)) => (c, p),
        _ => return resp_err(LedisError::Syntax),
    };
    RespValue::int(store.pubsub.publish(&channel, &payload) as i64)
}

/// SUBSCRIBE channel [channel ...]. One confirmation per channel: the first
/// is the direct reply, the rest ride the out-of-band frame queue so they
/// follow it on the wire in order.
pub fn cmd_subscribe(
    args: &[RespValue],
    store: &Store,
    client: &mut ClientState,
    sess: &Session,
    sub_tx: &mpsc::Sender<PubSubMessage>,
) -> RespValue {
    if args.is_empty() {
        return wrong_arg_count("subscribe");
    }
    let mut first: Option<RespValue> = None;
    for arg in args {
        let channel = match arg_to_string(arg) {
            Some(c) => c,
            None => continue,
        };
        let count = store
            .pubsub
            .subscribe(client.sub_id, &channel, sub_tx.clone());
        let frame = RespValue::Array(vec![
            RespValue::bulk(b"subscribe".to_vec()),
            RespValue::bulk(channel.into_bytes()),
            RespValue::int(count as i64),
        ]);
        if first.is_none() {
            first = Some(frame);
        } else {
            sess.push(frame);
        }
    }
    first.unwrap_or_else(|| resp_err(LedisError::Syntax))
}

/// UNSUBSCRIBE [channel ...]; with no channels, everything.
pub fn cmd_unsubscribe(
    args: &[RespValue],
    store: &Store,
    client: &mut ClientState,
    sess: &Session,
) -> RespValue {
    if args.is_empty() {
        store.pubsub.unsubscribe_all(client.sub_id);
        return RespValue::Array(vec![
            RespValue::bulk(b"unsubscribe".to_vec()),
            RespValue::Null,
            RespValue::int(0),
        ]);
    }
    let mut first: Option<RespValue> = None;
    for arg in args {
        let channel = match arg_to_string(arg) {
            Some(c) => c,
            None => continue,
        };
        let count = store.pubsub.unsubscribe(client.sub_id, &channel);
        let frame = RespValue::Array(vec![
            RespValue::bulk(b"unsubscribe".to_vec()),
            RespValue::bulk(channel.into_bytes()),
            RespValue::int(count as i64),
        ]);
        if first.is_none() {
            first = Some(frame);
        } else {
            sess.push(frame);
        }
    }
    first.unwrap_or_else(|| resp_err(LedisError::Syntax))
}

/// PUBSUB CHANNELS / PUBSUB NUMSUB [channel ...]
pub fn cmd_pubsub(args: &[RespValue], store: &Store) -> RespValue {
    let sub = match args.first().and_then(arg_to_string) {
        Some(s) => s.to_uppercase(),
        None => return wrong_arg_count("pubsub"),
    };
    match sub.as_str() {
        "CHANNELS" => RespValue::Array(
            store
                .pubsub
                .channels()
                .into_iter()
                .map(|c| RespValue::bulk(c.into_bytes()))
                .collect(),
        ),
        "NUMSUB" => {
            let names: Vec<String> = args[1..].iter().filter_map(arg_to_string).collect();
            let mut out = Vec::with_capacity(names.len() * 2);
            for (channel, count) in store.pubsub.numsub(&names) {
                out.push(RespValue::bulk(channel.into_bytes()));
                out.push(RespValue::int(count as i64));
            }
            RespValue::Array(out)
        }
        _ => RespValue::err(format!("ERR Unknown PUBSUB subcommand '{sub}'")),
    }
}
