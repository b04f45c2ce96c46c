use super::{arg_to_i64, arg_to_string, arg_to_u64, resp_err, track_read, wrong_arg_count};
use crate::connection::Session;
use crate::error::LedisError;
use crate::resp::RespValue;
use crate::store::bitmap::BitOp;
use crate::store::Store;

pub fn cmd_setbit(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() != 3 {
        return wrong_arg_count("setbit");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return resp_err(LedisError::Syntax),
    };
    let offset = match arg_to_u64(&args[1]) {
        Some(o) => o,
        None => return RespValue::err("ERR bit offset is not an integer or out of range"),
    };
    let value = match arg_to_i64(&args[2]) {
        Some(0) => false,
        Some(1) => true,
        _ => return RespValue::err("ERR bit is not an integer or out of range"),
    };
    match store.setbit(&key, offset, value) {
        Ok(prior) => RespValue::int(i64::from(prior)),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_getbit(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.len() != 2 {
        return wrong_arg_count("getbit");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::int(0),
    };
    let offset = match arg_to_u64(&args[1]) {
        Some(o) => o,
        None => return RespValue::err("ERR bit offset is not an integer or out of range"),
    };
    track_read(store, sess, &key);
    match store.getbit(&key, offset) {
        Ok(bit) => RespValue::int(i64::from(bit)),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_bitcount(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    // Byte-range arguments are not supported on the roaring representation.
    if args.len() != 1 {
        return resp_err(LedisError::Syntax);
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::int(0),
    };
    track_read(store, sess, &key);
    match store.bitcount(&key) {
        Ok(count) => RespValue::int(count as i64),
        Err(e) => resp_err(e),
    }
}

/// BITOP operation destkey key [key ...]
pub fn cmd_bitop(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() < 3 {
        return wrong_arg_count("bitop");
    }
    let op = match arg_to_string(&args[0]).and_then(|s| BitOp::parse(&s)) {
        Some(op) => op,
        None => return resp_err(LedisError::Syntax),
    };
    let destination = match arg_to_string(&args[1]) {
        Some(d) => d,
        None => return resp_err(LedisError::Syntax),
    };
    let keys: Vec<String> = args[2..].iter().filter_map(arg_to_string).collect();
    if op == BitOp::Not && keys.len() != 1 {
        return RespValue::err("ERR BITOP NOT must be called with a single source key");
    }
    match store.bitop(op, &destination, &keys) {
        Ok(cardinality) => RespValue::int(cardinality as i64),
        Err(e) => resp_err(e),
    }
}
