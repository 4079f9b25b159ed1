#![allow(dead_code)]

use std::collections::HashMap;
use std::env;
use std::ffi::{OsStr, OsString};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::thread;
use std::time::Duration;

use tiny_http::{Header, Response, Server};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn env_lock() -> MutexGuard<'static, ()> {
    match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
        Ok(g) => g,
        // A test that panicked while holding the lock must not wedge the rest.
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// RAII guard for test-only env var mutation.
///
/// All mutations through this guard are serialized with a global lock. Hold a
/// single guard per test; use `set_many` when several vars are needed.
#[must_use]
pub struct EnvVarGuard {
    entries: Vec<(String, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvVarGuard {
    pub fn set<K: Into<String>, V: AsRef<OsStr>>(key: K, value: V) -> Self {
        let key = key.into();
        Self::set_many(&[(key.as_str(), value.as_ref())])
    }

    pub fn unset_many(keys: &[&str]) -> Self {
        let lock = env_lock();
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            entries.push((key.to_string(), env::var_os(key)));
            unsafe {
                env::remove_var(key);
            }
        }
        Self {
            entries,
            _lock: lock,
        }
    }

    pub fn set_many(pairs: &[(&str, &OsStr)]) -> Self {
        let lock = env_lock();
        let mut entries = Vec::with_capacity(pairs.len());
        for (key, value) in pairs.iter() {
            entries.push((key.to_string(), env::var_os(key)));
            // Env mutation is unsound across threads; ENV_LOCK serializes it.
            unsafe {
                env::set_var(key, value);
            }
        }
        Self {
            entries,
            _lock: lock,
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        for (key, old) in self.entries.iter() {
            unsafe {
                match old {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

/// Canned reply for one path on the stub API.
#[derive(Debug, Clone)]
pub struct StubReply {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl StubReply {
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: "stub error".to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Minimal stand-in for the Hacker News API, served on an ephemeral port.
///
/// Every request is answered on its own thread so delayed replies overlap.
/// Unknown paths get a 404.
pub struct StubHn {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
    server: Arc<Server>,
}

impl StubHn {
    pub fn start(routes: HashMap<String, StubReply>) -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("bind stub server"));
        let addr = server
            .server_addr()
            .to_ip()
            .expect("stub server listens on an ip address");
        let hits = Arc::new(AtomicUsize::new(0));
        let routes = Arc::new(routes);

        thread::spawn({
            let server = Arc::clone(&server);
            let hits = Arc::clone(&hits);
            move || {
                for request in server.incoming_requests() {
                    hits.fetch_add(1, Ordering::SeqCst);
                    let routes = Arc::clone(&routes);
                    thread::spawn(move || {
                        let reply = routes.get(request.url()).cloned();
                        let response = match reply {
                            Some(reply) => {
                                thread::sleep(reply.delay);
                                json_response(reply.status, reply.body)
                            }
                            None => json_response(404, "not found".to_string()),
                        };
                        let _ = request.respond(response);
                    });
                }
            }
        });

        Self {
            base_url: format!("http://{addr}/v0"),
            hits,
            server,
        }
    }

    /// Stub serving `newstories.json` with `ids` and one item per `(id, story json)`.
    pub fn with_stories(ids: &[u64], stories: &[(u64, StubReply)]) -> Self {
        let mut routes = HashMap::new();
        routes.insert(
            "/v0/newstories.json".to_string(),
            StubReply::json(serde_json::to_string(ids).expect("serialize ids")),
        );
        for (id, reply) in stories {
            routes.insert(format!("/v0/item/{id}.json"), reply.clone());
        }
        Self::start(routes)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for StubHn {
    fn drop(&mut self) {
        self.server.unblock();
    }
}

pub fn story_json(id: u64, title: &str) -> String {
    serde_json::json!({
        "by": "tester",
        "id": id,
        "score": 1,
        "title": title,
        "url": format!("https://example.com/{id}"),
        "type": "story"
    })
    .to_string()
}

fn json_response(code: u16, body: String) -> Response<std::io::Cursor<Vec<u8>>> {
    let mut response = Response::from_data(body.into_bytes()).with_status_code(code);
    if let Ok(header) = Header::from_bytes("Content-Type", "application/json") {
        response = response.with_header(header);
    }
    response
}
