use super::{
    arg_to_bytes, arg_to_f64, arg_to_i64, arg_to_string, resp_err, track_read, wrong_arg_count,
};
use crate::connection::Session;
use crate::error::LedisError;
use crate::resp::RespValue;
use crate::store::Store;
use std::time::Duration;

pub fn cmd_push(args: &[RespValue], store: &Store, left: bool, only_existing: bool) -> RespValue {
    let name = match (left, only_existing) {
        (true, false) => "lpush",
        (false, false) => "rpush",
        (true, true) => "lpushx",
        (false, true) => "rpushx",
    };
    if args.len() < 2 {
        return wrong_arg_count(name);
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return resp_err(LedisError::Syntax),
    };
    let mut values = Vec::with_capacity(args.len() - 1);
    for arg in &args[1..] {
        match arg_to_bytes(arg) {
            Some(v) => values.push(v),
            None => return resp_err(LedisError::Syntax),
        }
    }
    let result = if only_existing {
        store.pushx(&key, values, left)
    } else {
        store.push(&key, values, left)
    };
    match result {
        Ok(len) => RespValue::int(len as i64),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_pop(args: &[RespValue], store: &Store, left: bool) -> RespValue {
    if args.len() != 1 {
        return wrong_arg_count(if left { "lpop" } else { "rpop" });
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::Null,
    };
    match store.pop(&key, left) {
        Ok(Some(value)) => RespValue::bulk(value),
        Ok(None) => RespValue::Null,
        Err(e) => resp_err(e),
    }
}

/// BLPOP/BRPOP key timeout. A zero timeout blocks without a deadline; a
/// successful pop replies `[key, value]`; expiry replies the timeout error.
pub async fn cmd_block_pop(args: &[RespValue], store: &Store, left: bool) -> RespValue {
    if args.len() != 2 {
        return wrong_arg_count(if left { "blpop" } else { "brpop" });
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return resp_err(LedisError::Syntax),
    };
    let timeout = match arg_to_f64(&args[1]) {
        Some(secs) if secs >= 0.0 => {
            if secs == 0.0 {
                None
            } else {
                Some(Duration::from_secs_f64(secs))
            }
        }
        _ => return RespValue::err("ERR timeout is not a float or out of range"),
    };
    match store.block_pop(&key, timeout, left).await {
        Ok(value) => RespValue::Array(vec![
            RespValue::bulk(key.into_bytes()),
            RespValue::bulk(value),
        ]),
        Err(e) => resp_err(e),
    }
}

/// The non-blocking form used when a blocking pop is replayed inside EXEC.
pub fn cmd_block_pop_immediate(args: &[RespValue], store: &Store, left: bool) -> RespValue {
    if args.len() != 2 {
        return wrong_arg_count(if left { "blpop" } else { "brpop" });
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return resp_err(LedisError::Syntax),
    };
    match store.pop(&key, left) {
        Ok(Some(value)) => RespValue::Array(vec![
            RespValue::bulk(key.into_bytes()),
            RespValue::bulk(value),
        ]),
        Ok(None) => RespValue::NullArray,
        Err(e) => resp_err(e),
    }
}

pub fn cmd_llen(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.len() != 1 {
        return wrong_arg_count("llen");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::int(0),
    };
    track_read(store, sess, &key);
    match store.llen(&key) {
        Ok(len) => RespValue::int(len as i64),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_lrange(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.len() != 3 {
        return wrong_arg_count("lrange");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::Array(Vec::new()),
    };
    let (start, stop) = match (arg_to_i64(&args[1]), arg_to_i64(&args[2])) {
        (Some(a), Some(b)) => (a, b),
        _ => return resp_err(LedisError::NotInteger),
    };
    track_read(store, sess, &key);
    match store.lrange(&key, start, stop) {
        Ok(values) => {
            RespValue::Array(values.into_iter().map(RespValue::Bulk).collect())
        }
        Err(e) => resp_err(e),
    }
}

pub fn cmd_lindex(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.len() != 2 {
        return wrong_arg_count("lindex");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::Null,
    };
    let index = match arg_to_i64(&args[1]) {
        Some(i) => i,
        None => return resp_err(LedisError::NotInteger),
    };
    track_read(store, sess, &key);
    match store.lindex(&key, index) {
        Ok(Some(value)) => RespValue::bulk(value),
        Ok(None) => RespValue::Null,
        Err(e) => resp_err(e),
    }
}

pub fn cmd_lset(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() != 3 {
        return wrong_arg_count("lset");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return resp_err(LedisError::NoSuchKey),
    };
    let index = match arg_to_i64(&args[1]) {
        Some(i) => i,
        None => return resp_err(LedisError::NotInteger),
    };
    let value = match arg_to_bytes(&args[2]) {
        Some(v) => v,
        None => return resp_err(LedisError::Syntax),
    };
    match store.lset(&key, index, value) {
        Ok(()) => RespValue::ok(),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_ltrim(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() != 3 {
        return wrong_arg_count("ltrim");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::ok(),
    };
    let (start, stop) = match (arg_to_i64(&args[1]), arg_to_i64(&args[2])) {
        (Some(a), Some(b)) => (a, b),
        _ => return resp_err(LedisError::NotInteger),
    };
    match store.ltrim(&key, start, stop) {
        Ok(()) => RespValue::ok(),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_lrem(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() != 3 {
        return wrong_arg_count("lrem");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::int(0),
    };
    let count = match arg_to_i64(&args[1]) {
        Some(c) => c,
        None => return resp_err(LedisError::NotInteger),
    };
    let value = match arg_to_bytes(&args[2]) {
        Some(v) => v,
        None => return resp_err(LedisError::Syntax),
    };
    match store.lrem(&key, count, &value) {
        Ok(removed) => RespValue::int(removed),
        Err(e) => resp_err(e),
    }
}
