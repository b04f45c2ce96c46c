use redis::Commands;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

fn start_server(port: u16) -> tokio::task::JoinHandle<()> {
    let config = ledis::config::Config {
        port,
        shards: 16,
        ..Default::default()
    };
    let store: Arc<ledis::store::Store> = ledis::store::Store::new(&config);
    tokio::spawn(async move {
        let _ = ledis::server::run_server(store, config).await;
    })
}

fn get_client(port: u16) -> redis::Connection {
    let client = redis::Client::open(format!("redis://127.0.0.1:{port}/")).unwrap();
    for i in 0..50 {
        match client.get_connection() {
            Ok(conn) => return conn,
            Err(_) if i < 49 => {
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => panic!("failed to connect: {e}"),
        }
    }
    unreachable!()
}

fn raw_connect(port: u16) -> std::net::TcpStream {
    for i in 0..50 {
        match std::net::TcpStream::connect(("127.0.0.1", port)) {
            Ok(s) => return s,
            Err(_) if i < 49 => {
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => panic!("failed to connect: {e}"),
        }
    }
    unreachable!()
}

fn raw_command(args: &[&[u8]]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", args.len()).into_bytes();
    for arg in args {
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
    out
}

fn read_some(stream: &mut std::net::TcpStream) -> Vec<u8> {
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let mut buf = [0u8; 4096];
    let n = stream.read(&mut buf).unwrap();
    buf[..n].to_vec()
}

#[tokio::test]
async fn test_ping() {
    let port = 17001;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let result: String = redis::cmd("PING").query(&mut conn).unwrap();
        assert_eq!(result, "PONG");
        let result: String = redis::cmd("PING").arg("hello").query(&mut conn).unwrap();
        assert_eq!(result, "hello");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_set_get_del() {
    let port = 17002;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let ok: String = redis::cmd("SET").arg("foo").arg("bar").query(&mut conn).unwrap();
        assert_eq!(ok, "OK");
        let val: String = conn.get("foo").unwrap();
        assert_eq!(val, "bar");
        let n: i64 = conn.del("foo").unwrap();
        assert_eq!(n, 1);
        let val: Option<String> = conn.get("foo").unwrap();
        assert_eq!(val, None);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_many_keys_roundtrip() {
    let port = 17003;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        for i in 0..50 {
            for j in 0..20 {
                let _: () = conn.set(format!("key-{i}-{j}"), j).unwrap();
            }
        }
        for i in 0..50 {
            for j in 0..20 {
                let val: i64 = conn.get(format!("key-{i}-{j}")).unwrap();
                assert_eq!(val, j);
            }
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_ttl_expiry() {
    let port = 17004;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let _: String = redis::cmd("SET")
            .arg("key_ttl")
            .arg("v")
            .arg("PX")
            .arg(100)
            .query(&mut conn)
            .unwrap();
        std::thread::sleep(Duration::from_millis(250));
        let exists: i64 = redis::cmd("EXISTS").arg("key_ttl").query(&mut conn).unwrap();
        assert_eq!(exists, 0);
        let val: Option<String> = conn.get("key_ttl").unwrap();
        assert_eq!(val, None);

        let _: String = redis::cmd("SET")
            .arg("k")
            .arg("v")
            .arg("EX")
            .arg(100)
            .query(&mut conn)
            .unwrap();
        let ttl: i64 = redis::cmd("TTL").arg("k").query(&mut conn).unwrap();
        assert!(ttl > 90 && ttl <= 100);
        let ttl: i64 = redis::cmd("TTL").arg("missing").query(&mut conn).unwrap();
        assert_eq!(ttl, -2);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_incr_family_and_append() {
    let port = 17005;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let n: i64 = redis::cmd("INCR").arg("n").query(&mut conn).unwrap();
        assert_eq!(n, 1);
        let n: i64 = redis::cmd("INCRBY").arg("n").arg(10).query(&mut conn).unwrap();
        assert_eq!(n, 11);
        let n: i64 = redis::cmd("DECRBY").arg("n").arg(5).query(&mut conn).unwrap();
        assert_eq!(n, 6);
        let n: i64 = redis::cmd("DECR").arg("n").query(&mut conn).unwrap();
        assert_eq!(n, 5);

        let _: () = conn.set("s", "abc").unwrap();
        let err = redis::cmd("INCR").arg("s").query::<i64>(&mut conn).unwrap_err();
        assert!(err.to_string().contains("not an integer"));

        let len: i64 = redis::cmd("APPEND").arg("s").arg("def").query(&mut conn).unwrap();
        assert_eq!(len, 6);
        let len: i64 = redis::cmd("STRLEN").arg("s").query(&mut conn).unwrap();
        assert_eq!(len, 6);
        let old: String = redis::cmd("GETSET").arg("s").arg("x").query(&mut conn).unwrap();
        assert_eq!(old, "abcdef");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_mset_mget() {
    let port = 17006;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let _: String = redis::cmd("MSET")
            .arg("a").arg("1")
            .arg("b").arg("2")
            .query(&mut conn)
            .unwrap();
        let vals: Vec<Option<String>> = redis::cmd("MGET")
            .arg("a").arg("missing").arg("b")
            .query(&mut conn)
            .unwrap();
        assert_eq!(
            vals,
            vec![Some("1".to_string()), None, Some("2".to_string())]
        );
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_list_commands() {
    let port = 17007;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let n: i64 = redis::cmd("LPUSH").arg("l").arg("a").arg("b").arg("c").query(&mut conn).unwrap();
        assert_eq!(n, 3);
        let range: Vec<String> = conn.lrange("l", 0, -1).unwrap();
        assert_eq!(range, vec!["c", "b", "a"]);

        let v: String = redis::cmd("LINDEX").arg("l").arg(-1).query(&mut conn).unwrap();
        assert_eq!(v, "a");
        let _: String = redis::cmd("LSET").arg("l").arg(1).arg("z").query(&mut conn).unwrap();
        let err = redis::cmd("LSET").arg("l").arg(9).arg("w").query::<String>(&mut conn).unwrap_err();
        assert!(err.to_string().contains("index out of range"));
        let err = redis::cmd("LSET").arg("nope").arg(0).arg("w").query::<String>(&mut conn).unwrap_err();
        assert!(err.to_string().contains("no such key"));

        let v: String = redis::cmd("LPOP").arg("l").query(&mut conn).unwrap();
        assert_eq!(v, "c");
        let v: String = redis::cmd("RPOP").arg("l").query(&mut conn).unwrap();
        assert_eq!(v, "a");
        let n: i64 = redis::cmd("LLEN").arg("l").query(&mut conn).unwrap();
        assert_eq!(n, 1);

        // Popping the last element removes the key.
        let _: String = redis::cmd("LPOP").arg("l").query(&mut conn).unwrap();
        let exists: i64 = redis::cmd("EXISTS").arg("l").query(&mut conn).unwrap();
        assert_eq!(exists, 0);

        let n: i64 = redis::cmd("RPUSHX").arg("l").arg("v").query(&mut conn).unwrap();
        assert_eq!(n, 0);

        for v in ["a", "x", "a", "x", "a"] {
            let _: i64 = redis::cmd("RPUSH").arg("l2").arg(v).query(&mut conn).unwrap();
        }
        let removed: i64 = redis::cmd("LREM").arg("l2").arg(2).arg("a").query(&mut conn).unwrap();
        assert_eq!(removed, 2);
        let _: String = redis::cmd("LTRIM").arg("l2").arg(0).arg(0).query(&mut conn).unwrap();
        let range: Vec<String> = conn.lrange("l2", 0, -1).unwrap();
        assert_eq!(range, vec!["x"]);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_blpop_handoff() {
    let port = 17008;
    let _server = start_server(port);
    let blocker = tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let result: (String, String) = redis::cmd("BLPOP")
            .arg("jobs")
            .arg(5)
            .query(&mut conn)
            .unwrap();
        result
    });
    tokio::time::sleep(Duration::from_millis(300)).await;
    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let _: i64 = redis::cmd("RPUSH").arg("jobs").arg("j1").query(&mut conn).unwrap();
    })
    .await
    .unwrap();
    let (key, value) = blocker.await.unwrap();
    assert_eq!(key, "jobs");
    assert_eq!(value, "j1");
}

#[tokio::test]
async fn test_blpop_timeout_errors() {
    let port = 17009;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let err = redis::cmd("BLPOP")
            .arg("empty")
            .arg(0.1)
            .query::<(String, String)>(&mut conn)
            .unwrap_err();
        assert!(err.to_string().contains("timeout"));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_hash_commands() {
    let port = 17010;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let created: i64 = redis::cmd("HSET")
            .arg("h").arg("f1").arg("v1").arg("f2").arg("2")
            .query(&mut conn)
            .unwrap();
        assert_eq!(created, 2);
        let v: String = redis::cmd("HGET").arg("h").arg("f1").query(&mut conn).unwrap();
        assert_eq!(v, "v1");
        let exists: i64 = redis::cmd("HEXISTS").arg("h").arg("f1").query(&mut conn).unwrap();
        assert_eq!(exists, 1);
        let n: i64 = redis::cmd("HINCRBY").arg("h").arg("f2").arg(3).query(&mut conn).unwrap();
        assert_eq!(n, 5);
        let all: std::collections::HashMap<String, String> =
            redis::cmd("HGETALL").arg("h").query(&mut conn).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["f2"], "5");

        let vals: Vec<Option<String>> = redis::cmd("HMGET")
            .arg("h").arg("f1").arg("zz")
            .query(&mut conn)
            .unwrap();
        assert_eq!(vals, vec![Some("v1".to_string()), None]);

        let deleted: i64 = redis::cmd("HDEL").arg("h").arg("f1").arg("f2").query(&mut conn).unwrap();
        assert_eq!(deleted, 2);
        let exists: i64 = redis::cmd("EXISTS").arg("h").query(&mut conn).unwrap();
        assert_eq!(exists, 0);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_set_commands() {
    let port = 17011;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let _: i64 = redis::cmd("SADD").arg("a").arg("1").arg("2").arg("3").query(&mut conn).unwrap();
        let _: i64 = redis::cmd("SADD").arg("b").arg("2").arg("3").arg("4").query(&mut conn).unwrap();

        let mut inter: Vec<String> = redis::cmd("SINTER").arg("a").arg("b").query(&mut conn).unwrap();
        inter.sort();
        assert_eq!(inter, vec!["2", "3"]);

        let mut diff: Vec<String> = redis::cmd("SDIFF").arg("a").arg("b").query(&mut conn).unwrap();
        diff.sort();
        assert_eq!(diff, vec!["1"]);

        let mut union: Vec<String> = redis::cmd("SUNION").arg("a").arg("b").query(&mut conn).unwrap();
        union.sort();
        assert_eq!(union, vec!["1", "2", "3", "4"]);

        let n: i64 = redis::cmd("SINTERSTORE").arg("dst").arg("a").arg("b").query(&mut conn).unwrap();
        assert_eq!(n, 2);

        let moved: i64 = redis::cmd("SMOVE").arg("a").arg("b").arg("1").query(&mut conn).unwrap();
        assert_eq!(moved, 1);
        let member: i64 = redis::cmd("SISMEMBER").arg("b").arg("1").query(&mut conn).unwrap();
        assert_eq!(member, 1);

        let card: i64 = redis::cmd("SCARD").arg("b").query(&mut conn).unwrap();
        assert_eq!(card, 4);
        let popped: String = redis::cmd("SPOP").arg("dst").query(&mut conn).unwrap();
        assert!(["2", "3"].contains(&popped.as_str()));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_sorted_set_commands() {
    let port = 17012;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        for (score, member) in [(1.0, "a"), (2.0, "b"), (3.0, "c")] {
            let _: i64 = redis::cmd("ZADD").arg("z").arg(score).arg(member).query(&mut conn).unwrap();
        }
        let score: f64 = redis::cmd("ZSCORE").arg("z").arg("b").query(&mut conn).unwrap();
        assert_eq!(score, 2.0);

        let card: i64 = redis::cmd("ZCARD").arg("z").query(&mut conn).unwrap();
        assert_eq!(card, 3);

        let rank: i64 = redis::cmd("ZRANK").arg("z").arg("c").query(&mut conn).unwrap();
        let rev: i64 = redis::cmd("ZREVRANK").arg("z").arg("c").query(&mut conn).unwrap();
        assert_eq!(rank + rev, card - 1);

        let members: Vec<String> = redis::cmd("ZRANGE").arg("z").arg(0).arg(-1).query(&mut conn).unwrap();
        assert_eq!(members, vec!["a", "b", "c"]);
        let members: Vec<String> = redis::cmd("ZREVRANGE").arg("z").arg(0).arg(0).query(&mut conn).unwrap();
        assert_eq!(members, vec!["c"]);

        let members: Vec<String> = redis::cmd("ZRANGEBYSCORE").arg("z").arg(2).arg(3).query(&mut conn).unwrap();
        assert_eq!(members, vec!["b", "c"]);

        let score: f64 = redis::cmd("ZINCRBY").arg("z").arg(5).arg("a").query(&mut conn).unwrap();
        assert_eq!(score, 6.0);

        let _: i64 = redis::cmd("SADD").arg("s").arg("b").arg("c").query(&mut conn).unwrap();
        let n: i64 = redis::cmd("ZINTERSTORE").arg("dst").arg(2).arg("z").arg("s").query(&mut conn).unwrap();
        assert_eq!(n, 2);
        // SUM aggregation with set members counting 1.0.
        let score: f64 = redis::cmd("ZSCORE").arg("dst").arg("b").query(&mut conn).unwrap();
        assert_eq!(score, 3.0);

        let removed: i64 = redis::cmd("ZREM").arg("z").arg("a").arg("b").arg("c").query(&mut conn).unwrap();
        assert_eq!(removed, 3);
        let exists: i64 = redis::cmd("EXISTS").arg("z").query(&mut conn).unwrap();
        assert_eq!(exists, 0);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_bitmap_commands() {
    let port = 17013;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let prior: i64 = redis::cmd("SETBIT").arg("b").arg(7).arg(1).query(&mut conn).unwrap();
        assert_eq!(prior, 0);
        let bit: i64 = redis::cmd("GETBIT").arg("b").arg(7).query(&mut conn).unwrap();
        assert_eq!(bit, 1);
        let prior: i64 = redis::cmd("SETBIT").arg("b").arg(7).arg(0).query(&mut conn).unwrap();
        assert_eq!(prior, 1);
        let bit: i64 = redis::cmd("GETBIT").arg("b").arg(7).query(&mut conn).unwrap();
        assert_eq!(bit, 0);

        for offset in [0, 3, 100] {
            let _: i64 = redis::cmd("SETBIT").arg("b").arg(offset).arg(1).query(&mut conn).unwrap();
        }
        let count: i64 = redis::cmd("BITCOUNT").arg("b").query(&mut conn).unwrap();
        assert_eq!(count, 3);

        let _: i64 = redis::cmd("SETBIT").arg("c").arg(3).arg(1).query(&mut conn).unwrap();
        let n: i64 = redis::cmd("BITOP").arg("AND").arg("d").arg("b").arg("c").query(&mut conn).unwrap();
        assert_eq!(n, 1);
        let bit: i64 = redis::cmd("GETBIT").arg("d").arg(3).query(&mut conn).unwrap();
        assert_eq!(bit, 1);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_stream_commands() {
    let port = 17014;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let mut ids = Vec::new();
        for i in 0..5 {
            let id: String = redis::cmd("XADD")
                .arg("s")
                .arg("MAXLEN")
                .arg(3)
                .arg("*")
                .arg("k")
                .arg(format!("v{i}"))
                .query(&mut conn)
                .unwrap();
            ids.push(id);
        }
        // Strictly increasing ids.
        for w in ids.windows(2) {
            assert!(w[1] > w[0], "{} !> {}", w[1], w[0]);
        }
        let len: i64 = redis::cmd("XLEN").arg("s").query(&mut conn).unwrap();
        assert_eq!(len, 3);

        // XRANGE returns the surviving three entries in insertion order.
        let entries: Vec<(String, Vec<String>)> = redis::cmd("XRANGE")
            .arg("s").arg("-").arg("+")
            .query(&mut conn)
            .unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].0, ids[2]);
        assert_eq!(entries[0].1, vec!["k", "v2"]);
        assert_eq!(entries[2].1, vec!["k", "v4"]);

        let rev: Vec<(String, Vec<String>)> = redis::cmd("XREVRANGE")
            .arg("s").arg("+").arg("-")
            .query(&mut conn)
            .unwrap();
        assert_eq!(rev[0].0, ids[4]);

        // XREAD after the middle surviving id sees only the newest entry.
        let read: Vec<(String, Vec<(String, Vec<String>)>)> = redis::cmd("XREAD")
            .arg("STREAMS").arg("s").arg(&ids[3])
            .query(&mut conn)
            .unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].1.len(), 1);
        assert_eq!(read[0].1[0].0, ids[4]);

        let err = redis::cmd("XADD")
            .arg("s").arg("0-0").arg("k").arg("v")
            .query::<String>(&mut conn)
            .unwrap_err();
        assert!(err.to_string().contains("equal or smaller"));

        let removed: i64 = redis::cmd("XTRIM").arg("s").arg("MAXLEN").arg(1).query(&mut conn).unwrap();
        assert_eq!(removed, 2);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_multi_exec() {
    let port = 17015;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let _: String = redis::cmd("MULTI").query(&mut conn).unwrap();
        let q: String = redis::cmd("SET").arg("a").arg("1").query(&mut conn).unwrap();
        assert_eq!(q, "QUEUED");
        let q: String = redis::cmd("INCR").arg("n").query(&mut conn).unwrap();
        assert_eq!(q, "QUEUED");
        let results: (String, i64) = redis::cmd("EXEC").query(&mut conn).unwrap();
        assert_eq!(results, ("OK".to_string(), 1));
        let val: String = conn.get("a").unwrap();
        assert_eq!(val, "1");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_exec_reports_errors_in_place() {
    let port = 17016;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let _: () = conn.set("s", "abc").unwrap();

        // Raw socket: a queued failure must land in the reply array without
        // aborting the commands after it.
        let mut stream = raw_connect(port);
        stream.write_all(&raw_command(&[b"MULTI"])).unwrap();
        assert_eq!(read_some(&mut stream), b"+OK\r\n");
        stream.write_all(&raw_command(&[b"INCR", b"s"])).unwrap();
        assert_eq!(read_some(&mut stream), b"+QUEUED\r\n");
        stream.write_all(&raw_command(&[b"SET", b"t", b"1"])).unwrap();
        assert_eq!(read_some(&mut stream), b"+QUEUED\r\n");
        stream.write_all(&raw_command(&[b"EXEC"])).unwrap();
        let reply = read_some(&mut stream);
        assert_eq!(
            reply,
            b"*2\r\n-ERR value is not an integer or out of range\r\n+OK\r\n".to_vec(),
            "got {:?}",
            String::from_utf8_lossy(&reply)
        );

        let val: String = conn.get("t").unwrap();
        assert_eq!(val, "1");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_watch_aborts_on_conflict() {
    let port = 17017;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let mut other = get_client(port);

        let _: String = redis::cmd("WATCH").arg("k").query(&mut conn).unwrap();
        let _: String = redis::cmd("MULTI").query(&mut conn).unwrap();
        let _: String = redis::cmd("SET").arg("k").arg("v").query(&mut conn).unwrap();

        // Conflicting write between WATCH and EXEC.
        let _: () = other.set("k", "v2").unwrap();
        std::thread::sleep(Duration::from_millis(100));

        let aborted: Option<Vec<String>> = redis::cmd("EXEC").query(&mut conn).unwrap();
        assert_eq!(aborted, None);
        let val: String = conn.get("k").unwrap();
        assert_eq!(val, "v2");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_watch_without_conflict_commits() {
    let port = 17018;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let _: String = redis::cmd("WATCH").arg("k").query(&mut conn).unwrap();
        let _: String = redis::cmd("MULTI").query(&mut conn).unwrap();
        let _: String = redis::cmd("SET").arg("k").arg("v").query(&mut conn).unwrap();
        let results: Vec<String> = redis::cmd("EXEC").query(&mut conn).unwrap();
        assert_eq!(results, vec!["OK"]);
        let val: String = conn.get("k").unwrap();
        assert_eq!(val, "v");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_tx_state_errors() {
    let port = 17019;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let err = redis::cmd("EXEC").query::<Vec<String>>(&mut conn).unwrap_err();
        assert!(err.to_string().contains("EXEC without MULTI"));
        let err = redis::cmd("DISCARD").query::<String>(&mut conn).unwrap_err();
        assert!(err.to_string().contains("DISCARD without MULTI"));

        let _: String = redis::cmd("MULTI").query(&mut conn).unwrap();
        let err = redis::cmd("WATCH").arg("k").query::<String>(&mut conn).unwrap_err();
        assert!(err.to_string().contains("WATCH inside MULTI"));
        let _: String = redis::cmd("DISCARD").query(&mut conn).unwrap();
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_pubsub_roundtrip() {
    let port = 17020;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let client = redis::Client::open(format!("redis://127.0.0.1:{port}/")).unwrap();
        let mut sub_conn = get_client(port);
        let mut pubsub = sub_conn.as_pubsub();
        pubsub.subscribe("news").unwrap();

        let mut pub_conn = client.get_connection().unwrap();
        std::thread::sleep(Duration::from_millis(100));
        let receivers: i64 = redis::cmd("PUBLISH").arg("news").arg("flash").query(&mut pub_conn).unwrap();
        assert_eq!(receivers, 1);

        pubsub.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let msg = pubsub.get_message().unwrap();
        assert_eq!(msg.get_channel_name(), "news");
        let payload: String = msg.get_payload().unwrap();
        assert_eq!(payload, "flash");

        // Introspection from the publisher side.
        let channels: Vec<String> = redis::cmd("PUBSUB").arg("CHANNELS").query(&mut pub_conn).unwrap();
        assert_eq!(channels, vec!["news"]);
        let numsub: Vec<redis::Value> = redis::cmd("PUBSUB").arg("NUMSUB").arg("news").query(&mut pub_conn).unwrap();
        assert_eq!(numsub.len(), 2);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_hello_payloads() {
    let port = 17021;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let mut stream = raw_connect(port);
        stream.write_all(&raw_command(&[b"HELLO", b"3"])).unwrap();
        let reply = read_some(&mut stream);
        assert!(reply.starts_with(b"%7\r\n"), "got {:?}", String::from_utf8_lossy(&reply));
        assert!(reply.windows(5).any(|w| w == b"proto"));

        stream.write_all(&raw_command(&[b"HELLO", b"2"])).unwrap();
        let reply = read_some(&mut stream);
        assert!(reply.starts_with(b"*14\r\n"), "got {:?}", String::from_utf8_lossy(&reply));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_client_tracking_invalidation_push() {
    let port = 17022;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let mut tracked = raw_connect(port);
        tracked
            .write_all(&raw_command(&[b"CLIENT", b"TRACKING", b"ON"]))
            .unwrap();
        assert_eq!(read_some(&mut tracked), b"+OK\r\n");

        tracked.write_all(&raw_command(&[b"GET", b"k1"])).unwrap();
        assert_eq!(read_some(&mut tracked), b"$-1\r\n");

        let mut writer = get_client(port);
        let _: () = writer.set("k1", "v2").unwrap();

        let push = read_some(&mut tracked);
        assert_eq!(
            push,
            b">2\r\n$10\r\ninvalidate\r\n*1\r\n$2\r\nk1\r\n".to_vec(),
            "got {:?}",
            String::from_utf8_lossy(&push)
        );

        // One-shot: a second write without re-reading pushes nothing.
        let _: () = writer.set("k1", "v3").unwrap();
        tracked
            .set_read_timeout(Some(Duration::from_millis(300)))
            .unwrap();
        let mut buf = [0u8; 64];
        match tracked.read(&mut buf) {
            Ok(n) => assert_eq!(n, 0, "unexpected push: {:?}", String::from_utf8_lossy(&buf[..n])),
            Err(e) => assert!(
                matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut),
                "unexpected error: {e}"
            ),
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_client_commands() {
    let port = 17023;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let id: i64 = redis::cmd("CLIENT").arg("ID").query(&mut conn).unwrap();
        assert!(id > 0);
        let _: String = redis::cmd("CLIENT").arg("SETNAME").arg("tester").query(&mut conn).unwrap();
        let name: String = redis::cmd("CLIENT").arg("GETNAME").query(&mut conn).unwrap();
        assert_eq!(name, "tester");
        let info: String = redis::cmd("CLIENT").arg("INFO").query(&mut conn).unwrap();
        assert!(info.contains(&format!("id={id}")));
        assert!(info.contains("name=tester"));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_wrong_type_error() {
    let port = 17024;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let _: () = conn.set("s", "v").unwrap();
        let err = redis::cmd("LPUSH").arg("s").arg("x").query::<i64>(&mut conn).unwrap_err();
        assert!(err.to_string().contains("WRONGTYPE"));
        // The connection stays usable after an error frame.
        let pong: String = redis::cmd("PING").query(&mut conn).unwrap();
        assert_eq!(pong, "PONG");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_unknown_command() {
    let port = 17025;
    let _server = start_server(port);
    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let err = redis::cmd("FROBNICATE").query::<String>(&mut conn).unwrap_err();
        assert!(err.to_string().contains("unknown command"));
    })
    .await
    .unwrap();
}
