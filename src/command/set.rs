use super::{arg_to_bytes, arg_to_i64, arg_to_string, resp_err, track_read, wrong_arg_count};
use crate::connection::Session;
use crate::error::LedisError;
use crate::resp::RespValue;
use crate::store::Store;

#[derive(Debug, Clone, Copy)]
pub enum Combine {
    Diff,
    Inter,
    Union,
}

pub fn cmd_sadd(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() < 2 {
        return wrong_arg_count("sadd");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return resp_err(LedisError::Syntax),
    };
    let members: Vec<Vec<u8>> = args[1..].iter().filter_map(arg_to_bytes).collect();
    match store.sadd(&key, members) {
        Ok(added) => RespValue::int(added as i64),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_srem(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() < 2 {
        return wrong_arg_count("srem");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::int(0),
    };
    let members: Vec<Vec<u8>> = args[1..].iter().filter_map(arg_to_bytes).collect();
    match store.srem(&key, &members) {
        Ok(removed) => RespValue::int(removed as i64),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_sismember(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.len() != 2 {
        return wrong_arg_count("sismember");
    }
    let (key, member) = match (arg_to_string(&args[0]), arg_to_bytes(&args[1])) {
        (Some(k), Some(m)) => (k, m),
        _ => return RespValue::int(0),
    };
    track_read(store, sess, &key);
    match store.sismember(&key, &member) {
        Ok(found) => RespValue::int(i64::from(found)),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_smembers(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.len() != 1 {
        return wrong_arg_count("smembers");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::Array(Vec::new()),
    };
    track_read(store, sess, &key);
    match store.smembers(&key) {
        Ok(members) => {
            RespValue::Array(members.into_iter().map(RespValue::Bulk).collect())
        }
        Err(e) => resp_err(e),
    }
}

pub fn cmd_scard(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.len() != 1 {
        return wrong_arg_count("scard");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::int(0),
    };
    track_read(store, sess, &key);
    match store.scard(&key) {
        Ok(len) => RespValue::int(len as i64),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_spop(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() != 1 {
        return wrong_arg_count("spop");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::Null,
    };
    match store.spop(&key) {
        Ok(Some(member)) => RespValue::bulk(member),
        Ok(None) => RespValue::Null,
        Err(e) => resp_err(e),
    }
}

pub fn cmd_srandmember(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.is_empty() || args.len() > 2 {
        return wrong_arg_count("srandmember");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::Null,
    };
    track_read(store, sess, &key);

    // Without a count the reply is a single member or nil.
    if args.len() == 1 {
        return match store.srandmember(&key, 1) {
            Ok(mut members) => match members.pop() {
                Some(m) => RespValue::bulk(m),
                None => RespValue::Null,
            },
            Err(e) => resp_err(e),
        };
    }

    let count = match arg_to_i64(&args[1]) {
        Some(c) => c,
        None => return resp_err(LedisError::NotInteger),
    };
    match store.srandmember(&key, count) {
        Ok(members) => {
            RespValue::Array(members.into_iter().map(RespValue::Bulk).collect())
        }
        Err(e) => resp_err(e),
    }
}

pub fn cmd_smove(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() != 3 {
        return wrong_arg_count("smove");
    }
    let (source, destination, member) = match (
        arg_to_string(&args[0]),
        arg_to_string(&args[1]),
        arg_to_bytes(&args[2]),
    ) {
        (Some(s), Some(d), Some(m)) => (s, d, m),
        _ => return resp_err(LedisError::Syntax),
    };
    match store.smove(&source, &destination, &member) {
        Ok(moved) => RespValue::int(i64::from(moved)),
        Err(e) => resp_err(e),
    }
}

/// SDIFF/SINTER/SUNION and their STORE variants.
pub fn cmd_combine(args: &[RespValue], store: &Store, op: Combine, store_dest: bool) -> RespValue {
    let min_args = if store_dest { 2 } else { 1 };
    if args.len() < min_args {
        let name = match (op, store_dest) {
            (Combine::Diff, false) => "sdiff",
            (Combine::Diff, true) => "sdiffstore",
            (Combine::Inter, false) => "sinter",
            (Combine::Inter, true) => "sinterstore",
            (Combine::Union, false) => "sunion",
            (Combine::Union, true) => "sunionstore",
        };
        return wrong_arg_count(name);
    }

    let (destination, key_args) = if store_dest {
        match arg_to_string(&args[0]) {
            Some(d) => (Some(d), &args[1..]),
            None => return resp_err(LedisError::Syntax),
        }
    } else {
        (None, args)
    };
    let keys: Vec<String> = key_args.iter().filter_map(arg_to_string).collect();

    let result = match op {
        Combine::Diff => store.sdiff(&keys),
        Combine::Inter => store.sinter(&keys),
        Combine::Union => store.sunion(&keys),
    };
    let members = match result {
        Ok(members) => members,
        Err(e) => return resp_err(e),
    };

    match destination {
        Some(destination) => {
            RespValue::int(store.store_set_result(&destination, members) as i64)
        }
        None => RespValue::Array(members.into_iter().map(RespValue::Bulk).collect()),
    }
}
