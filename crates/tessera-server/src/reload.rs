//! Live reload over WebSocket.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Messages sent to connected pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Connection established
    Connected,

    /// Full page reload
    Reload,

    /// Re-fetch a stylesheet without reloading the page
    Css {
        /// Path of the stylesheet relative to the served directory
        path: String,
    },
}

/// Hub for broadcasting reload messages to all connected pages.
///
/// Slow clients that fall behind miss messages rather than block senders.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadMessage>,
}

impl ReloadHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to every connected page.
    pub fn send(&self, msg: ReloadMessage) {
        // No receivers is fine
        let _ = self.sender.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate the client-side reload script.
///
/// The socket URL is derived from the page's own host, so the script works
/// behind any host name the server is reached by.
pub fn client_script(notify: bool) -> String {
    format!(
        r#"
(function() {{
  'use strict';

  var showNotice = {notify};
  var scheme = location.protocol === 'https:' ? 'wss://' : 'ws://';
  var ws = new WebSocket(scheme + location.host + '/__reload');
  var reconnectAttempts = 0;
  var maxReconnectAttempts = 10;

  function notice(text) {{
    if (!showNotice || !document.body) return;
    var el = document.createElement('div');
    el.textContent = text;
    el.setAttribute('style',
      'position:fixed;top:0;right:0;z-index:9999;padding:6px 12px;' +
      'font:13px sans-serif;color:#fff;background:#1b1b1b;opacity:.9');
    document.body.appendChild(el);
    setTimeout(function() {{ el.remove(); }}, 1500);
  }}

  function refreshStylesheets(path) {{
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    var matched = false;
    links.forEach(function(link) {{
      var href = link.getAttribute('href') || '';
      var bare = href.split('?')[0];
      if (bare.slice(-path.length) === path) {{
        link.setAttribute('href', bare + '?v=' + Date.now());
        matched = true;
      }}
    }});
    return matched;
  }}

  ws.onopen = function() {{
    console.log('[reload] Connected');
    reconnectAttempts = 0;
  }};

  ws.onmessage = function(event) {{
    var msg = JSON.parse(event.data);

    switch (msg.type) {{
      case 'reload':
        notice('Reloading...');
        location.reload();
        break;

      case 'css':
        if (refreshStylesheets(msg.path)) {{
          notice('Injected ' + msg.path);
        }} else {{
          location.reload();
        }}
        break;

      case 'connected':
        console.log('[reload] Server acknowledged connection');
        break;
    }}
  }};

  ws.onclose = function() {{
    console.log('[reload] Disconnected');
    if (reconnectAttempts < maxReconnectAttempts) {{
      reconnectAttempts++;
      setTimeout(function() {{
        location.reload();
      }}, 1000 * reconnectAttempts);
    }}
  }};
}})();
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_broadcasts_messages() {
        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();

        hub.send(ReloadMessage::Css {
            path: "css/main.css".to_string(),
        });

        match rx.try_recv() {
            Ok(ReloadMessage::Css { path }) => assert_eq!(path, "css/main.css"),
            other => panic!("Expected Css message, got {:?}", other),
        }
    }

    #[test]
    fn send_without_clients_is_ignored() {
        let hub = ReloadHub::new();
        hub.send(ReloadMessage::Reload);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn messages_are_tagged_by_type() {
        assert_eq!(
            serde_json::to_string(&ReloadMessage::Reload).unwrap(),
            r#"{"type":"reload"}"#
        );
        assert_eq!(
            serde_json::to_string(&ReloadMessage::Css {
                path: "css/main.css".into()
            })
            .unwrap(),
            r#"{"type":"css","path":"css/main.css"}"#
        );
    }

    #[test]
    fn script_uses_page_host() {
        let script = client_script(false);
        assert!(script.contains("location.host + '/__reload'"));
        assert!(script.contains("var showNotice = false;"));
        assert!(client_script(true).contains("var showNotice = true;"));
    }
}
