use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    /// Number of shards in the key space. Rounded up to a power of two.
    pub shards: usize,
    /// Entries inspected per shard per tick by the probabilistic sampler.
    pub evict_sample_rate: usize,
    /// Pause between full round-robin sweep cycles.
    pub sweep_rest_period: Duration,
    /// Per-subscriber pub/sub queue depth. Messages beyond this are dropped.
    pub pubsub_queue_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: "127.0.0.1".to_string(),
            port: 6379,
            shards: 1024,
            evict_sample_rate: 20,
            sweep_rest_period: Duration::from_secs(300),
            pubsub_queue_depth: 1024,
        }
    }
}

impl Config {
    pub fn from_args(args: &[String]) -> Self {
        let mut config = Config::default();
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--port" => {
                    if i + 1 < args.len() {
                        if let Ok(p) = args[i + 1].parse() {
                            config.port = p;
                        }
                        i += 1;
                    }
                }
                "--bind" => {
                    if i + 1 < args.len() {
                        config.bind = args[i + 1].clone();
                        i += 1;
                    }
                }
                "--shards" => {
                    if i + 1 < args.len() {
                        if let Ok(n) = args[i + 1].parse() {
                            config.shards = n;
                        }
                        i += 1;
                    }
                }
                "--evict-sample-rate" => {
                    if i + 1 < args.len() {
                        if let Ok(n) = args[i + 1].parse() {
                            config.evict_sample_rate = n;
                        }
                        i += 1;
                    }
                }
                "--sweep-rest-secs" => {
                    if i + 1 < args.len() {
                        if let Ok(n) = args[i + 1].parse() {
                            config.sweep_rest_period = Duration::from_secs(n);
                        }
                        i += 1;
                    }
                }
                "--pubsub-queue-depth" => {
                    if i + 1 < args.len() {
                        if let Ok(n) = args[i + 1].parse() {
                            config.pubsub_queue_depth = n;
                        }
                        i += 1;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        config
    }
}
