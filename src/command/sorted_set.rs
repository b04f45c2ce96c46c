use super::{
    arg_to_bytes, arg_to_f64, arg_to_i64, arg_to_string, fmt_score, resp_err, track_read,
    wrong_arg_count,
};
use crate::connection::Session;
use crate::error::LedisError;
use crate::resp::RespValue;
use crate::store::Store;

fn member_score_reply(pairs: Vec<(Vec<u8>, f64)>, with_scores: bool) -> RespValue {
    let mut out = Vec::with_capacity(pairs.len() * if with_scores { 2 } else { 1 });
    for (member, score) in pairs {
        out.push(RespValue::bulk(member));
        if with_scores {
            out.push(RespValue::bulk(fmt_score(score).into_bytes()));
        }
    }
    RespValue::Array(out)
}

fn parse_with_scores(args: &[RespValue]) -> Result<bool, RespValue> {
    match args.len() {
        0 => Ok(false),
        1 => match arg_to_string(&args[0]) {
            Some(s) if s.eq_ignore_ascii_case("withscores") => Ok(true),
            _ => Err(resp_err(LedisError::Syntax)),
        },
        _ => Err(resp_err(LedisError::Syntax)),
    }
}

pub fn cmd_zadd(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() < 3 || (args.len() - 1) % 2 != 0 {
        return wrong_arg_count("zadd");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return resp_err(LedisError::Syntax),
    };
    let mut added = 0;
    for chunk in args[1..].chunks(2) {
        let score = match arg_to_f64(&chunk[0]) {
            Some(s) => s,
            None => return RespValue::err("ERR value is not a valid float"),
        };
        let member = match arg_to_bytes(&chunk[1]) {
            Some(m) => m,
            None => return resp_err(LedisError::Syntax),
        };
        match store.zadd(&key, score, member) {
            Ok(n) => added += n,
            Err(e) => return resp_err(e),
        }
    }
    RespValue::int(added as i64)
}

pub fn cmd_zrem(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() < 2 {
        return wrong_arg_count("zrem");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::int(0),
    };
    let members: Vec<Vec<u8>> = args[1..].iter().filter_map(arg_to_bytes).collect();
    match store.zrem(&key, &members) {
        Ok(removed) => RespValue::int(removed as i64),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_zscore(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.len() != 2 {
        return wrong_arg_count("zscore");
    }
    let (key, member) = match (arg_to_string(&args[0]), arg_to_bytes(&args[1])) {
        (Some(k), Some(m)) => (k, m),
        _ => return RespValue::Null,
    };
    track_read(store, sess, &key);
    match store.zscore(&key, &member) {
        Ok(Some(score)) => RespValue::bulk(fmt_score(score).into_bytes()),
        Ok(None) => RespValue::Null,
        Err(e) => resp_err(e),
    }
}

pub fn cmd_zcard(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.len() != 1 {
        return wrong_arg_count("zcard");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::int(0),
    };
    track_read(store, sess, &key);
    match store.zcard(&key) {
        Ok(len) => RespValue::int(len as i64),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_zincrby(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() != 3 {
        return wrong_arg_count("zincrby");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return resp_err(LedisError::Syntax),
    };
    let delta = match arg_to_f64(&args[1]) {
        Some(d) => d,
        None => return RespValue::err("ERR value is not a valid float"),
    };
    let member = match arg_to_bytes(&args[2]) {
        Some(m) => m,
        None => return resp_err(LedisError::Syntax),
    };
    match store.zincrby(&key, delta, member) {
        Ok(score) => RespValue::bulk(fmt_score(score).into_bytes()),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_zrange(args: &[RespValue], store: &Store, sess: &Session, reverse: bool) -> RespValue {
    if args.len() < 3 {
        return wrong_arg_count(if reverse { "zrevrange" } else { "zrange" });
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::Array(Vec::new()),
    };
    let (start, stop) = match (arg_to_i64(&args[1]), arg_to_i64(&args[2])) {
        (Some(a), Some(b)) => (a, b),
        _ => return resp_err(LedisError::NotInteger),
    };
    let with_scores = match parse_with_scores(&args[3..]) {
        Ok(ws) => ws,
        Err(e) => return e,
    };
    track_read(store, sess, &key);
    match store.zrange(&key, start, stop, reverse) {
        Ok(pairs) => member_score_reply(pairs, with_scores),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_zrange_by_score(
    args: &[RespValue],
    store: &Store,
    sess: &Session,
    reverse: bool,
) -> RespValue {
    let name = if reverse {
        "zrevrangebyscore"
    } else {
        "zrangebyscore"
    };
    if args.len() < 3 {
        return wrong_arg_count(name);
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::Array(Vec::new()),
    };
    // ZREVRANGEBYSCORE takes max before min.
    let (first, second) = match (arg_to_f64(&args[1]), arg_to_f64(&args[2])) {
        (Some(a), Some(b)) => (a, b),
        _ => return RespValue::err("ERR min or max is not a float"),
    };
    let (min, max) = if reverse { (second, first) } else { (first, second) };
    let with_scores = match parse_with_scores(&args[3..]) {
        Ok(ws) => ws,
        Err(e) => return e,
    };
    track_read(store, sess, &key);
    match store.zrange_by_score(&key, min, max, reverse) {
        Ok(pairs) => member_score_reply(pairs, with_scores),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_zrank(args: &[RespValue], store: &Store, sess: &Session, reverse: bool) -> RespValue {
    if args.len() != 2 {
        return wrong_arg_count(if reverse { "zrevrank" } else { "zrank" });
    }
    let (key, member) = match (arg_to_string(&args[0]), arg_to_bytes(&args[1])) {
        (Some(k), Some(m)) => (k, m),
        _ => return RespValue::Null,
    };
    track_read(store, sess, &key);
    match store.zrank(&key, &member, reverse) {
        Ok(Some(rank)) => RespValue::int(rank as i64),
        Ok(None) => RespValue::Null,
        Err(e) => resp_err(e),
    }
}

/// ZINTERSTORE destination numkeys key [key ...]
pub fn cmd_zinterstore(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() < 3 {
        return wrong_arg_count("zinterstore");
    }
    let destination = match arg_to_string(&args[0]) {
        Some(d) => d,
        None => return resp_err(LedisError::Syntax),
    };
    let numkeys = match arg_to_i64(&args[1]) {
        Some(n) if n > 0 => n as usize,
        _ => return resp_err(LedisError::Syntax),
    };
    if args.len() != 2 + numkeys {
        return resp_err(LedisError::Syntax);
    }
    let keys: Vec<String> = args[2..].iter().filter_map(arg_to_string).collect();
    match store.zinterstore(&destination, &keys) {
        Ok(len) => RespValue::int(len as i64),
        Err(e) => resp_err(e),
    }
}
