use super::{
    arg_to_bytes, arg_to_i64, arg_to_string, resp_err, track_read, wrong_arg_count,
};
use crate::connection::Session;
use crate::error::LedisError;
use crate::resp::RespValue;
use crate::store::item::Value;
use crate::store::Store;
use std::time::Duration;

pub fn cmd_get(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.len() != 1 {
        return wrong_arg_count("get");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::Null,
    };
    track_read(store, sess, &key);
    match store.get_string(&key) {
        Ok(Some(value)) => RespValue::bulk(value),
        Ok(None) => RespValue::Null,
        Err(e) => resp_err(e),
    }
}

pub fn cmd_set(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() < 2 {
        return wrong_arg_count("set");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return resp_err(LedisError::Syntax),
    };
    let value = match arg_to_bytes(&args[1]) {
        Some(v) => v,
        None => return resp_err(LedisError::Syntax),
    };

    // Options: EX seconds | PX millis
    let mut ttl: Option<Duration> = None;
    let mut i = 2;
    while i < args.len() {
        let opt = match arg_to_string(&args[i]) {
            Some(s) => s.to_uppercase(),
            None => return resp_err(LedisError::Syntax),
        };
        match opt.as_str() {
            "EX" => {
                i += 1;
                match args.get(i).and_then(arg_to_i64) {
                    Some(n) if n > 0 => ttl = Some(Duration::from_secs(n as u64)),
                    _ => return RespValue::err("ERR invalid expire time in 'set' command"),
                }
            }
            "PX" => {
                i += 1;
                match args.get(i).and_then(arg_to_i64) {
                    Some(n) if n > 0 => ttl = Some(Duration::from_millis(n as u64)),
                    _ => return RespValue::err("ERR invalid expire time in 'set' command"),
                }
            }
            _ => return resp_err(LedisError::Syntax),
        }
        i += 1;
    }

    store.set_string(&key, value, ttl);
    RespValue::ok()
}

pub fn cmd_getset(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() != 2 {
        return wrong_arg_count("getset");
    }
    let (key, value) = match (arg_to_string(&args[0]), arg_to_bytes(&args[1])) {
        (Some(k), Some(v)) => (k, v),
        _ => return resp_err(LedisError::Syntax),
    };
    match store.getset(&key, value) {
        Ok(Some(prior)) => RespValue::bulk(prior),
        Ok(None) => RespValue::Null,
        Err(e) => resp_err(e),
    }
}

pub fn cmd_mset(args: &[RespValue], store: &Store) -> RespValue {
    if args.is_empty() || args.len() % 2 != 0 {
        return wrong_arg_count("mset");
    }
    for pair in args.chunks(2) {
        let (key, value) = match (arg_to_string(&pair[0]), arg_to_bytes(&pair[1])) {
            (Some(k), Some(v)) => (k, v),
            _ => return resp_err(LedisError::Syntax),
        };
        store.set_string(&key, value, None);
    }
    RespValue::ok()
}

pub fn cmd_mget(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.is_empty() {
        return wrong_arg_count("mget");
    }
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        let key = match arg_to_string(arg) {
            Some(k) => k,
            None => {
                out.push(RespValue::Null);
                continue;
            }
        };
        track_read(store, sess, &key);
        // A key of another type reads as nil here rather than erroring.
        let value = store.get(&key).and_then(|item| {
            match &*item.value.read().unwrap() {
                Value::Str(s) => Some(s.clone()),
                _ => None,
            }
        });
        out.push(match value {
            Some(v) => RespValue::bulk(v),
            None => RespValue::Null,
        });
    }
    RespValue::Array(out)
}

pub fn cmd_incrby_fixed(args: &[RespValue], store: &Store, delta: i64, name: &str) -> RespValue {
    if args.len() != 1 {
        return wrong_arg_count(name);
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return resp_err(LedisError::Syntax),
    };
    match store.incr_by(&key, delta) {
        Ok(n) => RespValue::int(n),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_incrby(args: &[RespValue], store: &Store, negate: bool) -> RespValue {
    let name = if negate { "decrby" } else { "incrby" };
    if args.len() != 2 {
        return wrong_arg_count(name);
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return resp_err(LedisError::Syntax),
    };
    let delta = match arg_to_i64(&args[1]) {
        Some(n) => n,
        None => return resp_err(LedisError::NotInteger),
    };
    let delta = if negate { -delta } else { delta };
    match store.incr_by(&key, delta) {
        Ok(n) => RespValue::int(n),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_append(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() != 2 {
        return wrong_arg_count("append");
    }
    let (key, value) = match (arg_to_string(&args[0]), arg_to_bytes(&args[1])) {
        (Some(k), Some(v)) => (k, v),
        _ => return resp_err(LedisError::Syntax),
    };
    match store.append(&key, &value) {
        Ok(len) => RespValue::int(len as i64),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_strlen(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.len() != 1 {
        return wrong_arg_count("strlen");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::int(0),
    };
    track_read(store, sess, &key);
    match store.strlen(&key) {
        Ok(len) => RespValue::int(len as i64),
        Err(e) => resp_err(e),
    }
}
