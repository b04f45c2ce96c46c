use super::{arg_to_bytes, arg_to_string, resp_err, wrong_arg_count};
use crate::connection::{ClientState, Session};
use crate::error::LedisError;
use crate::resp::RespValue;

const SERVER_VERSION: &str = "7.2.4";

pub fn cmd_ping(args: &[RespValue]) -> RespValue {
    match args.first() {
        Some(arg) => match arg_to_bytes(arg) {
            Some(msg) => RespValue::bulk(msg),
            None => resp_err(LedisError::Syntax),
        },
        None => RespValue::status("PONG"),
    }
}

/// HELLO [protover]. The RESP3 reply is a map; RESP2 gets the same payload
/// flattened into a 14-element array.
pub fn cmd_hello(args: &[RespValue], sess: &Session, client: &mut ClientState) -> RespValue {
    let proto = match args.first() {
        Some(arg) => match arg_to_string(arg).and_then(|s| s.parse::<u8>().ok()) {
            Some(v @ (2 | 3)) => v,
            _ => {
                return RespValue::err(
                    "NOPROTO unsupported protocol version",
                )
            }
        },
        None => client.proto,
    };
    client.proto = proto;

    let fields: Vec<(RespValue, RespValue)> = vec![
        (
            RespValue::bulk(b"server".to_vec()),
            RespValue::bulk(b"redis".to_vec()),
        ),
        (
            RespValue::bulk(b"version".to_vec()),
            RespValue::bulk(SERVER_VERSION.as_bytes().to_vec()),
        ),
        (
            RespValue::bulk(b"proto".to_vec()),
            RespValue::int(proto as i64),
        ),
        (
            RespValue::bulk(b"id".to_vec()),
            RespValue::int(sess.id as i64),
        ),
        (
            RespValue::bulk(b"mode".to_vec()),
            RespValue::bulk(b"standalone".to_vec()),
        ),
        (
            RespValue::bulk(b"role".to_vec()),
            RespValue::bulk(b"master".to_vec()),
        ),
        (
            RespValue::bulk(b"modules".to_vec()),
            RespValue::Array(Vec::new()),
        ),
    ];

    if proto == 3 {
        RespValue::Map(fields)
    } else {
        let mut flat = Vec::with_capacity(fields.len() * 2);
        for (k, v) in fields {
            flat.push(k);
            flat.push(v);
        }
        RespValue::Array(flat)
    }
}

/// CLIENT ID | INFO | SETNAME | GETNAME | TRACKING ON/OFF
pub fn cmd_client(args: &[RespValue], sess: &Session) -> RespValue {
    let sub = match args.first().and_then(arg_to_string) {
        Some(s) => s.to_uppercase(),
        None => return wrong_arg_count("client"),
    };
    match sub.as_str() {
        "ID" => RespValue::int(sess.id as i64),
        "INFO" => {
            let name = sess.name.lock().unwrap().clone().unwrap_or_default();
            let info = format!(
                "id={} addr={} name={} db=0 resp=2 cmd=client|info",
                sess.id, sess.addr, name
            );
            RespValue::bulk(info.into_bytes())
        }
        // Client libraries announce themselves with SETINFO; accept and drop.
        "SETINFO" => RespValue::ok(),
        "SETNAME" => match args.get(1).and_then(arg_to_string) {
            Some(name) => {
                *sess.name.lock().unwrap() = Some(name);
                RespValue::ok()
            }
            None => resp_err(LedisError::Syntax),
        },
        "GETNAME" => match sess.name.lock().unwrap().clone() {
            Some(name) => RespValue::bulk(name.into_bytes()),
            None => RespValue::Null,
        },
        "TRACKING" => match args.get(1).and_then(arg_to_string) {
            Some(mode) if mode.eq_ignore_ascii_case("on") => {
                sess.set_tracking(true);
                RespValue::ok()
            }
            Some(mode) if mode.eq_ignore_ascii_case("off") => {
                sess.set_tracking(false);
                RespValue::ok()
            }
            _ => resp_err(LedisError::Syntax),
        },
        _ => RespValue::err(format!("ERR Unknown CLIENT subcommand '{sub}'")),
    }
}
