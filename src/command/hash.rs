use super::{arg_to_bytes, arg_to_i64, arg_to_string, resp_err, track_read, wrong_arg_count};
use crate::connection::Session;
use crate::error::LedisError;
use crate::resp::RespValue;
use crate::store::Store;

pub fn cmd_hset(args: &[RespValue], store: &Store, name: &str) -> RespValue {
    if args.len() < 3 || (args.len() - 1) % 2 != 0 {
        return wrong_arg_count(&name.to_lowercase());
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return resp_err(LedisError::Syntax),
    };
    let mut pairs = Vec::with_capacity((args.len() - 1) / 2);
    for chunk in args[1..].chunks(2) {
        match (arg_to_bytes(&chunk[0]), arg_to_bytes(&chunk[1])) {
            (Some(f), Some(v)) => pairs.push((f, v)),
            _ => return resp_err(LedisError::Syntax),
        }
    }
    match store.hset(&key, pairs) {
        // HMSET keeps its legacy OK reply; HSET reports created fields.
        Ok(created) => {
            if name.eq_ignore_ascii_case("hmset") {
                RespValue::ok()
            } else {
                RespValue::int(created as i64)
            }
        }
        Err(e) => resp_err(e),
    }
}

pub fn cmd_hget(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.len() != 2 {
        return wrong_arg_count("hget");
    }
    let (key, field) = match (arg_to_string(&args[0]), arg_to_bytes(&args[1])) {
        (Some(k), Some(f)) => (k, f),
        _ => return RespValue::Null,
    };
    track_read(store, sess, &key);
    match store.hget(&key, &field) {
        Ok(Some(value)) => RespValue::bulk(value),
        Ok(None) => RespValue::Null,
        Err(e) => resp_err(e),
    }
}

pub fn cmd_hdel(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() < 2 {
        return wrong_arg_count("hdel");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::int(0),
    };
    let fields: Vec<Vec<u8>> = args[1..].iter().filter_map(arg_to_bytes).collect();
    match store.hdel(&key, &fields) {
        Ok(removed) => RespValue::int(removed as i64),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_hlen(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.len() != 1 {
        return wrong_arg_count("hlen");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::int(0),
    };
    track_read(store, sess, &key);
    match store.hlen(&key) {
        Ok(len) => RespValue::int(len as i64),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_hexists(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.len() != 2 {
        return wrong_arg_count("hexists");
    }
    let (key, field) = match (arg_to_string(&args[0]), arg_to_bytes(&args[1])) {
        (Some(k), Some(f)) => (k, f),
        _ => return RespValue::int(0),
    };
    track_read(store, sess, &key);
    match store.hexists(&key, &field) {
        Ok(found) => RespValue::int(i64::from(found)),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_hgetall(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.len() != 1 {
        return wrong_arg_count("hgetall");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::Array(Vec::new()),
    };
    track_read(store, sess, &key);
    match store.hgetall(&key) {
        Ok(pairs) => {
            let mut out = Vec::with_capacity(pairs.len() * 2);
            for (field, value) in pairs {
                out.push(RespValue::bulk(field));
                out.push(RespValue::bulk(value));
            }
            RespValue::Array(out)
        }
        Err(e) => resp_err(e),
    }
}

pub fn cmd_hmget(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.len() < 2 {
        return wrong_arg_count("hmget");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return resp_err(LedisError::Syntax),
    };
    let fields: Vec<Vec<u8>> = args[1..].iter().filter_map(arg_to_bytes).collect();
    track_read(store, sess, &key);
    match store.hmget(&key, &fields) {
        Ok(values) => RespValue::Array(
            values
                .into_iter()
                .map(|v| match v {
                    Some(v) => RespValue::bulk(v),
                    None => RespValue::Null,
                })
                .collect(),
        ),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_hkeys(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.len() != 1 {
        return wrong_arg_count("hkeys");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::Array(Vec::new()),
    };
    track_read(store, sess, &key);
    match store.hkeys(&key) {
        Ok(fields) => RespValue::Array(fields.into_iter().map(RespValue::Bulk).collect()),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_hvals(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.len() != 1 {
        return wrong_arg_count("hvals");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::Array(Vec::new()),
    };
    track_read(store, sess, &key);
    match store.hvals(&key) {
        Ok(values) => RespValue::Array(values.into_iter().map(RespValue::Bulk).collect()),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_hincrby(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() != 3 {
        return wrong_arg_count("hincrby");
    }
    let (key, field) = match (arg_to_string(&args[0]), arg_to_bytes(&args[1])) {
        (Some(k), Some(f)) => (k, f),
        _ => return resp_err(LedisError::Syntax),
    };
    let delta = match arg_to_i64(&args[2]) {
        Some(d) => d,
        None => return resp_err(LedisError::NotInteger),
    };
    match store.hincrby(&key, &field, delta) {
        Ok(n) => RespValue::int(n),
        Err(e) => resp_err(e),
    }
}
