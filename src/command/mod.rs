pub mod bitmap;
pub mod hash;
pub mod key;
pub mod list;
pub mod pubsub;
pub mod server_cmd;
pub mod set;
pub mod sorted_set;
pub mod stream;
pub mod string;
pub mod transaction;

use crate::connection::{ClientState, Session};
use crate::error::LedisError;
use crate::pubsub::PubSubMessage;
use crate::resp::RespValue;
use crate::store::Store;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Dispatch a parsed command.
///
/// Inside MULTI, anything that is not itself a transaction command is queued
/// and answered with QUEUED; its errors (unknown command included) surface in
/// the EXEC reply array instead.
pub async fn dispatch(
    cmd_name: &str,
    args: &[RespValue],
    store: &Arc<Store>,
    sess: &Arc<Session>,
    client: &mut ClientState,
    sub_tx: &mpsc::Sender<PubSubMessage>,
) -> RespValue {
    if client.in_tx
        && !matches!(cmd_name, "EXEC" | "DISCARD" | "MULTI" | "WATCH" | "UNWATCH")
    {
        client.queue.push((cmd_name.to_string(), args.to_vec()));
        return RespValue::status("QUEUED");
    }

    match cmd_name {
        // Transactions
        "MULTI" => transaction::cmd_multi(client),
        "EXEC" => transaction::cmd_exec(store, sess, client).await,
        "DISCARD" => transaction::cmd_discard(client, sess),
        "WATCH" => transaction::cmd_watch(args, store, sess, client),
        "UNWATCH" => transaction::cmd_unwatch(sess),

        // Connection-bound commands
        "QUIT" => {
            client.should_close = true;
            RespValue::ok()
        }
        "HELLO" => server_cmd::cmd_hello(args, sess, client),
        "CLIENT" => server_cmd::cmd_client(args, sess),
        "SUBSCRIBE" => pubsub::cmd_subscribe(args, store, client, sess, sub_tx),
        "UNSUBSCRIBE" => pubsub::cmd_unsubscribe(args, store, client, sess),

        // Everything else only needs the store and the session.
        _ => execute_data(cmd_name, args, store, sess).await,
    }
}

/// Execute a command that touches only the store (plus read tracking). These
/// are the commands eligible to run on EXEC's shard-parallel path.
pub async fn execute_data(
    cmd_name: &str,
    args: &[RespValue],
    store: &Arc<Store>,
    sess: &Arc<Session>,
) -> RespValue {
    match cmd_name {
        "PING" => server_cmd::cmd_ping(args),

        // Keys
        "DEL" => key::cmd_del(args, store),
        "EXISTS" => key::cmd_exists(args, store, sess),
        "TTL" => key::cmd_ttl(args, store, sess),

        // Strings
        "GET" => string::cmd_get(args, store, sess),
        "SET" => string::cmd_set(args, store),
        "GETSET" => string::cmd_getset(args, store),
        "MSET" => string::cmd_mset(args, store),
        "MGET" => string::cmd_mget(args, store, sess),
        "INCR" => string::cmd_incrby_fixed(args, store, 1, "incr"),
        "DECR" => string::cmd_incrby_fixed(args, store, -1, "decr"),
        "INCRBY" => string::cmd_incrby(args, store, false),
        "DECRBY" => string::cmd_incrby(args, store, true),
        "APPEND" => string::cmd_append(args, store),
        "STRLEN" => string::cmd_strlen(args, store, sess),

        // Lists
        "LPUSH" => list::cmd_push(args, store, true, false),
        "RPUSH" => list::cmd_push(args, store, false, false),
        "LPUSHX" => list::cmd_push(args, store, true, true),
        "RPUSHX" => list::cmd_push(args, store, false, true),
        "LPOP" => list::cmd_pop(args, store, true),
        "RPOP" => list::cmd_pop(args, store, false),
        "LLEN" => list::cmd_llen(args, store, sess),
        "LRANGE" => list::cmd_lrange(args, store, sess),
        "LINDEX" => list::cmd_lindex(args, store, sess),
        "LSET" => list::cmd_lset(args, store),
        "LTRIM" => list::cmd_ltrim(args, store),
        "LREM" => list::cmd_lrem(args, store),
        "BLPOP" => list::cmd_block_pop(args, store, true).await,
        "BRPOP" => list::cmd_block_pop(args, store, false).await,

        // Hashes
        "HSET" | "HMSET" => hash::cmd_hset(args, store, cmd_name),
        "HGET" => hash::cmd_hget(args, store, sess),
        "HDEL" => hash::cmd_hdel(args, store),
        "HLEN" => hash::cmd_hlen(args, store, sess),
        "HEXISTS" => hash::cmd_hexists(args, store, sess),
        "HGETALL" => hash::cmd_hgetall(args, store, sess),
        "HMGET" => hash::cmd_hmget(args, store, sess),
        "HKEYS" => hash::cmd_hkeys(args, store, sess),
        "HVALS" => hash::cmd_hvals(args, store, sess),
        "HINCRBY" => hash::cmd_hincrby(args, store),

        // Sets
        "SADD" => set::cmd_sadd(args, store),
        "SREM" => set::cmd_srem(args, store),
        "SISMEMBER" => set::cmd_sismember(args, store, sess),
        "SMEMBERS" => set::cmd_smembers(args, store, sess),
        "SCARD" => set::cmd_scard(args, store, sess),
        "SPOP" => set::cmd_spop(args, store),
        "SRANDMEMBER" => set::cmd_srandmember(args, store, sess),
        "SMOVE" => set::cmd_smove(args, store),
        "SDIFF" => set::cmd_combine(args, store, set::Combine::Diff, false),
        "SDIFFSTORE" => set::cmd_combine(args, store, set::Combine::Diff, true),
        "SINTER" => set::cmd_combine(args, store, set::Combine::Inter, false),
        "SINTERSTORE" => set::cmd_combine(args, store, set::Combine::Inter, true),
        "SUNION" => set::cmd_combine(args, store, set::Combine::Union, false),
        "SUNIONSTORE" => set::cmd_combine(args, store, set::Combine::Union, true),

        // Sorted sets
        "ZADD" => sorted_set::cmd_zadd(args, store),
        "ZREM" => sorted_set::cmd_zrem(args, store),
        "ZSCORE" => sorted_set::cmd_zscore(args, store, sess),
        "ZCARD" => sorted_set::cmd_zcard(args, store, sess),
        "ZINCRBY" => sorted_set::cmd_zincrby(args, store),
        "ZRANGE" => sorted_set::cmd_zrange(args, store, sess, false),
        "ZREVRANGE" => sorted_set::cmd_zrange(args, store, sess, true),
        "ZRANGEBYSCORE" => sorted_set::cmd_zrange_by_score(args, store, sess, false),
        "ZREVRANGEBYSCORE" => sorted_set::cmd_zrange_by_score(args, store, sess, true),
        "ZRANK" => sorted_set::cmd_zrank(args, store, sess, false),
        "ZREVRANK" => sorted_set::cmd_zrank(args, store, sess, true),
        "ZINTERSTORE" => sorted_set::cmd_zinterstore(args, store),

        // Bitmaps
        "SETBIT" => bitmap::cmd_setbit(args, store),
        "GETBIT" => bitmap::cmd_getbit(args, store, sess),
        "BITCOUNT" => bitmap::cmd_bitcount(args, store, sess),
        "BITOP" => bitmap::cmd_bitop(args, store),

        // Streams
        "XADD" => stream::cmd_xadd(args, store),
        "XLEN" => stream::cmd_xlen(args, store, sess),
        "XRANGE" => stream::cmd_xrange(args, store, sess, false),
        "XREVRANGE" => stream::cmd_xrange(args, store, sess, true),
        "XREAD" => stream::cmd_xread(args, store, sess),
        "XTRIM" => stream::cmd_xtrim(args, store),

        // Pub/sub (publisher side and introspection are store-only)
        "PUBLISH" => pubsub::cmd_publish(args, store),
        "PUBSUB" => pubsub::cmd_pubsub(args, store),

        _ => resp_err(LedisError::UnknownCommand(cmd_name.to_string())),
    }
}

/// The syntactically-known single key of a queued command, used to decide
/// whether an EXEC queue can fan out per shard. Multi-key and opaque commands
/// return `None` and force sequential execution.
pub(crate) fn single_key(cmd: &str, args: &[RespValue]) -> Option<String> {
    match cmd {
        "GET" | "SET" | "GETSET" | "INCR" | "DECR" | "INCRBY" | "DECRBY" | "APPEND"
        | "STRLEN" | "TTL" | "LPUSH" | "RPUSH" | "LPUSHX" | "RPUSHX" | "LPOP" | "RPOP"
        | "LLEN" | "LRANGE" | "LINDEX" | "LSET" | "LTRIM" | "LREM" | "HSET" | "HMSET"
        | "HGET" | "HDEL" | "HLEN" | "HEXISTS" | "HGETALL" | "HMGET" | "HKEYS" | "HVALS"
        | "HINCRBY" | "SADD" | "SREM" | "SISMEMBER" | "SMEMBERS" | "SCARD" | "SPOP"
        | "SRANDMEMBER" | "ZADD" | "ZREM" | "ZSCORE" | "ZCARD" | "ZINCRBY" | "ZRANGE"
        | "ZREVRANGE" | "ZRANGEBYSCORE" | "ZREVRANGEBYSCORE" | "ZRANK" | "ZREVRANK"
        | "SETBIT" | "GETBIT" | "BITCOUNT" | "XADD" | "XLEN" | "XRANGE" | "XREVRANGE"
        | "XTRIM" => args.first().and_then(|a| a.text()),
        "EXISTS" | "DEL" if args.len() == 1 => args[0].text(),
        _ => None,
    }
}

pub(crate) fn arg_to_string(arg: &RespValue) -> Option<String> {
    arg.text()
}

pub(crate) fn arg_to_bytes(arg: &RespValue) -> Option<Vec<u8>> {
    match arg {
        RespValue::Integer(n) => Some(n.to_string().into_bytes()),
        other => other.as_bytes().map(|b| b.to_vec()),
    }
}

pub(crate) fn arg_to_i64(arg: &RespValue) -> Option<i64> {
    match arg {
        RespValue::Integer(n) => Some(*n),
        other => other
            .as_bytes()
            .and_then(|b| std::str::from_utf8(b).ok())
            .and_then(|s| s.parse().ok()),
    }
}

pub(crate) fn arg_to_u64(arg: &RespValue) -> Option<u64> {
    match arg {
        RespValue::Integer(n) => u64::try_from(*n).ok(),
        other => other
            .as_bytes()
            .and_then(|b| std::str::from_utf8(b).ok())
            .and_then(|s| s.parse().ok()),
    }
}

pub(crate) fn arg_to_f64(arg: &RespValue) -> Option<f64> {
    match arg {
        RespValue::Integer(n) => Some(*n as f64),
        other => other
            .as_bytes()
            .and_then(|b| std::str::from_utf8(b).ok())
            .and_then(|s| s.parse().ok()),
    }
}

pub(crate) fn wrong_arg_count(name: &str) -> RespValue {
    resp_err(LedisError::WrongArgCount(name.to_string()))
}

pub(crate) fn resp_err(e: LedisError) -> RespValue {
    RespValue::err(e.to_string())
}

/// Register read interest when the client has tracking on.
pub(crate) fn track_read(store: &Store, sess: &Session, key: &str) {
    if sess.tracking() {
        store.tracker.track(key, sess.id);
    }
}

/// Redis-style float formatting: integral scores print without a fraction.
pub(crate) fn fmt_score(score: f64) -> String {
    if score == score.trunc() && score.is_finite() {
        format!("{}", score as i64)
    } else {
        format!("{score}")
    }
}
