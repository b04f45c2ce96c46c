use super::{arg_to_bytes, arg_to_string, arg_to_u64, resp_err, track_read, wrong_arg_count};
use crate::connection::Session;
use crate::error::LedisError;
use crate::resp::RespValue;
use crate::store::Store;
use crate::types::stream::{StreamEntry, StreamId};

fn entry_reply(entry: StreamEntry) -> RespValue {
    RespValue::Array(vec![
        RespValue::bulk(entry.id.to_string().into_bytes()),
        RespValue::Array(entry.fields.into_iter().map(RespValue::Bulk).collect()),
    ])
}

fn entries_reply(entries: Vec<StreamEntry>) -> RespValue {
    RespValue::Array(entries.into_iter().map(entry_reply).collect())
}

/// XADD key [MAXLEN n] id field value [field value ...]
pub fn cmd_xadd(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() < 2 {
        return wrong_arg_count("xadd");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return resp_err(LedisError::Syntax),
    };

    let mut i = 1;
    let mut max_len = 0usize;
    if let Some(opt) = arg_to_string(&args[i]) {
        if opt.eq_ignore_ascii_case("maxlen") {
            i += 1;
            max_len = match args.get(i).and_then(arg_to_u64) {
                Some(n) => n as usize,
                None => return resp_err(LedisError::Syntax),
            };
            i += 1;
        }
    }

    let id_spec = match args.get(i).and_then(arg_to_string) {
        Some(id) => id,
        None => return wrong_arg_count("xadd"),
    };
    i += 1;

    let fields: Vec<Vec<u8>> = args[i..].iter().filter_map(arg_to_bytes).collect();
    if fields.is_empty() || fields.len() % 2 != 0 {
        return wrong_arg_count("xadd");
    }

    match store.xadd(&key, &id_spec, fields, max_len) {
        Ok(id) => RespValue::bulk(id.to_string().into_bytes()),
        Err(e) => resp_err(e),
    }
}

pub fn cmd_xlen(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.len() != 1 {
        return wrong_arg_count("xlen");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::int(0),
    };
    track_read(store, sess, &key);
    match store.xlen(&key) {
        Ok(len) => RespValue::int(len as i64),
        Err(e) => resp_err(e),
    }
}

/// XRANGE key start end / XREVRANGE key end start
pub fn cmd_xrange(args: &[RespValue], store: &Store, sess: &Session, reverse: bool) -> RespValue {
    let name = if reverse { "xrevrange" } else { "xrange" };
    if args.len() != 3 {
        return wrong_arg_count(name);
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::Array(Vec::new()),
    };
    let (lo_arg, hi_arg) = if reverse {
        (&args[2], &args[1])
    } else {
        (&args[1], &args[2])
    };
    let start = match arg_to_string(lo_arg).and_then(|s| StreamId::parse_range_start(&s)) {
        Some(id) => id,
        None => return RespValue::err("ERR Invalid stream ID specified as stream command argument"),
    };
    let end = match arg_to_string(hi_arg).and_then(|s| StreamId::parse_range_end(&s)) {
        Some(id) => id,
        None => return RespValue::err("ERR Invalid stream ID specified as stream command argument"),
    };
    track_read(store, sess, &key);
    match store.xrange(&key, start, end, reverse) {
        Ok(entries) => entries_reply(entries),
        Err(e) => resp_err(e),
    }
}

/// XREAD [COUNT n] STREAMS key [key ...] id [id ...]
pub fn cmd_xread(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.len() < 3 {
        return wrong_arg_count("xread");
    }

    let mut i = 0;
    let mut count = 0usize;
    if let Some(opt) = arg_to_string(&args[i]) {
        if opt.eq_ignore_ascii_case("count") {
            i += 1;
            count = match args.get(i).and_then(arg_to_u64) {
                Some(n) => n as usize,
                None => return resp_err(LedisError::Syntax),
            };
            i += 1;
        }
    }

    match args.get(i).and_then(arg_to_string) {
        Some(kw) if kw.eq_ignore_ascii_case("streams") => {}
        _ => return resp_err(LedisError::Syntax),
    }
    i += 1;

    let rest = &args[i..];
    if rest.is_empty() || rest.len() % 2 != 0 {
        return resp_err(LedisError::Syntax);
    }
    let n = rest.len() / 2;

    let mut queries = Vec::with_capacity(n);
    for j in 0..n {
        let key = match arg_to_string(&rest[j]) {
            Some(k) => k,
            None => return resp_err(LedisError::Syntax),
        };
        let after = match arg_to_string(&rest[n + j]).and_then(|s| StreamId::parse(&s, 0)) {
            Some(id) => id,
            None => {
                return RespValue::err(
                    "ERR Invalid stream ID specified as stream command argument",
                )
            }
        };
        track_read(store, sess, &key);
        queries.push((key, after));
    }

    match store.xread(&queries, count) {
        Ok(results) => {
            if results.is_empty() {
                return RespValue::NullArray;
            }
            RespValue::Array(
                results
                    .into_iter()
                    .map(|(key, entries)| {
                        RespValue::Array(vec![
                            RespValue::bulk(key.into_bytes()),
                            entries_reply(entries),
                        ])
                    })
                    .collect(),
            )
        }
        Err(e) => resp_err(e),
    }
}

/// XTRIM key MAXLEN n
pub fn cmd_xtrim(args: &[RespValue], store: &Store) -> RespValue {
    if args.len() != 3 {
        return wrong_arg_count("xtrim");
    }
    let key = match arg_to_string(&args[0]) {
        Some(k) => k,
        None => return RespValue::int(0),
    };
    match arg_to_string(&args[1]) {
        Some(kw) if kw.eq_ignore_ascii_case("maxlen") => {}
        _ => return resp_err(LedisError::Syntax),
    }
    let max_len = match arg_to_u64(&args[2]) {
        Some(n) => n as usize,
        None => return resp_err(LedisError::Syntax),
    };
    match store.xtrim(&key, max_len) {
        Ok(removed) => RespValue::int(removed as i64),
        Err(e) => resp_err(e),
    }
}
