use super::{arg_to_string, track_read, wrong_arg_count};
use crate::connection::Session;
use crate::resp::RespValue;
use crate::store::Store;

pub fn cmd_del(args: &[RespValue], store: &Store) -> RespValue {
    if args.is_empty() {
        return wrong_arg_count("del");
    }
    let mut count = 0;
    for arg in args {
        if let Some(key) = arg_to_string(arg) {
            if store.del(&key) {
                count += 1;
            }
        }
    }
    RespValue::int(count)
}

pub fn cmd_exists(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.is_empty() {
        return wrong_arg_count("exists");
    }
    let mut count = 0;
    for arg in args {
        if let Some(key) = arg_to_string(arg) {
            track_read(store, sess, &key);
            if store.exists(&key) {
                count += 1;
            }
        }
    }
    RespValue::int(count)
}

pub fn cmd_ttl(args: &[RespValue], store: &Store, sess: &Session) -> RespValue {
    if args.len() != 1 {
        return wrong_arg_count("ttl");
    }
    match arg_to_string(&args[0]) {
        Some(key) => {
            track_read(store, sess, &key);
            RespValue::int(store.ttl(&key))
        }
        None => RespValue::int(-2),
    }
}
