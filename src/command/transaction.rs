use super::{arg_to_string, execute_data, list, resp_err, single_key, wrong_arg_count};
use crate::connection::{ClientState, Session};
use crate::error::LedisError;
use crate::resp::RespValue;
use crate::store::Store;
use std::collections::HashMap;
use std::sync::Arc;

pub fn cmd_multi(client: &mut ClientState) -> RespValue {
    if client.in_tx {
        return resp_err(LedisError::Tx("MULTI calls can not be nested".to_string()));
    }
    client.in_tx = true;
    client.queue.clear();
    RespValue::ok()
}

pub fn cmd_discard(client: &mut ClientState, sess: &Session) -> RespValue {
    if !client.in_tx {
        return resp_err(LedisError::Tx("DISCARD without MULTI".to_string()));
    }
    client.in_tx = false;
    client.queue.clear();
    let mut watch = sess.watch.lock().unwrap();
    watch.watching.clear();
    watch.dirty = false;
    RespValue::ok()
}

/// WATCH installs the connection as an observer of each key; the observer
/// callback flips the dirty flag when any of them is invalidated.
pub fn cmd_watch(
    args: &[RespValue],
    store: &Store,
    sess: &Session,
    client: &ClientState,
) -> RespValue {
    if args.is_empty() {
        return wrong_arg_count("watch");
    }
    if client.in_tx {
        return resp_err(LedisError::Tx("WATCH inside MULTI is not allowed".to_string()));
    }
    for arg in args {
        if let Some(key) = arg_to_string(arg) {
            sess.watch.lock().unwrap().watching.insert(key.clone());
            store.tracker.track(&key, sess.id);
        }
    }
    RespValue::ok()
}

pub fn cmd_unwatch(sess: &Session) -> RespValue {
    let mut watch = sess.watch.lock().unwrap();
    watch.watching.clear();
    watch.dirty = false;
    RespValue::ok()
}

/// EXEC. A dirty watch aborts with a null array and nothing runs. Otherwise
/// the queue executes in order; when every queued command has one
/// syntactically-known key, the queue fans out per shard and the replies are
/// stitched back in queue order.
pub async fn cmd_exec(
    store: &Arc<Store>,
    sess: &Arc<Session>,
    client: &mut ClientState,
) -> RespValue {
    if !client.in_tx {
        return resp_err(LedisError::Tx("EXEC without MULTI".to_string()));
    }
    client.in_tx = false;
    let queue = std::mem::take(&mut client.queue);

    let dirty = {
        let mut watch = sess.watch.lock().unwrap();
        let dirty = watch.dirty;
        watch.watching.clear();
        watch.dirty = false;
        dirty
    };
    if dirty {
        return RespValue::NullArray;
    }

    let keys: Option<Vec<String>> = queue.iter().map(|(c, a)| single_key(c, a)).collect();
    match keys {
        Some(keys) if queue.len() > 1 => {
            let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
            for (i, key) in keys.iter().enumerate() {
                groups.entry(store.shard_index(key)).or_default().push(i);
            }

            let queue = Arc::new(queue);
            let mut handles = Vec::with_capacity(groups.len());
            for (_, indices) in groups {
                let store = store.clone();
                let sess = sess.clone();
                let queue = queue.clone();
                handles.push(tokio::spawn(async move {
                    let mut out = Vec::with_capacity(indices.len());
                    for idx in indices {
                        let (cmd, args) = &queue[idx];
                        out.push((idx, exec_queued(cmd, args, &store, &sess).await));
                    }
                    out
                }));
            }

            let mut results: Vec<Option<RespValue>> = vec![None; queue.len()];
            for handle in handles {
                if let Ok(pairs) = handle.await {
                    for (idx, resp) in pairs {
                        results[idx] = Some(resp);
                    }
                }
            }
            RespValue::Array(
                results
                    .into_iter()
                    .map(|r| r.unwrap_or_else(|| RespValue::err("ERR transaction worker failed")))
                    .collect(),
            )
        }
        _ => {
            let mut results = Vec::with_capacity(queue.len());
            for (cmd, args) in &queue {
                results.push(exec_queued(cmd, args, store, sess).await);
            }
            RespValue::Array(results)
        }
    }
}

/// Queued-command execution. Blocking pops run their non-blocking form so a
/// transaction can never stall; errors land in the reply array in place.
async fn exec_queued(
    cmd: &str,
    args: &[RespValue],
    store: &Arc<Store>,
    sess: &Arc<Session>,
) -> RespValue {
    match cmd {
        "BLPOP" => list::cmd_block_pop_immediate(args, store, true),
        "BRPOP" => list::cmd_block_pop_immediate(args, store, false),
        _ => execute_data(cmd, args, store, sess).await,
    }
}
