//! Runtime protection snippet injected into rewritten documents
//!
//! Static rewriting cannot see URLs built by scripts after load. The snippet
//! patches the browser entry points that take URLs and resolves relative ones
//! against the target origin. Absolute URLs pass through untouched.

use url::Url;

/// Attribute marking the injected `<script>`; its presence means "already injected"
pub const GUARD_MARKER: &str = "data-passage-guard";

const ORIGIN_PLACEHOLDER: &str = "__PASSAGE_ORIGIN__";

const TEMPLATE: &str = r#"(function () {
  if (window.__passageGuard) { return; }
  window.__passageGuard = true;
  var ORIGIN = __PASSAGE_ORIGIN__;
  var ABSOLUTE = /^[a-zA-Z][a-zA-Z0-9+.-]*:/;

  function fixUrl(u) {
    if (typeof u !== 'string' || u === '' || u.charAt(0) === '#') { return u; }
    if (ABSOLUTE.test(u) || u.indexOf('//') === 0) { return u; }
    try { return new URL(u, ORIGIN + '/').href; } catch (e) { return u; }
  }

  function fixMarkup(html) {
    if (typeof html !== 'string') { return html; }
    return html.replace(/\b(src|href)=(["'])([^"']*)\2/gi, function (m, attr, q, value) {
      return attr + '=' + q + fixUrl(value) + q;
    });
  }

  var nativeOpen = window.open;
  window.open = function (u) {
    var args = Array.prototype.slice.call(arguments);
    args[0] = fixUrl(u);
    return nativeOpen.apply(window, args);
  };

  if (window.fetch) {
    var nativeFetch = window.fetch;
    window.fetch = function (input, init) {
      return nativeFetch.call(window, typeof input === 'string' ? fixUrl(input) : input, init);
    };
  }

  var nativeXhrOpen = XMLHttpRequest.prototype.open;
  XMLHttpRequest.prototype.open = function (method, u) {
    var args = Array.prototype.slice.call(arguments);
    args[1] = fixUrl(u);
    return nativeXhrOpen.apply(this, args);
  };

  var nativeWrite = document.write;
  document.write = function (content) {
    return nativeWrite.call(document, fixMarkup(content));
  };
  var nativeWriteln = document.writeln;
  document.writeln = function (content) {
    return nativeWriteln.call(document, fixMarkup(content));
  };

  if (window.WebSocket) {
    var NativeWebSocket = window.WebSocket;
    var PatchedWebSocket = function (u, protocols) {
      var target = u;
      if (typeof u === 'string' && !ABSOLUTE.test(u)) {
        target = fixUrl(u).replace(/^http/, 'ws');
      }
      return protocols === undefined ? new NativeWebSocket(target) : new NativeWebSocket(target, protocols);
    };
    PatchedWebSocket.prototype = NativeWebSocket.prototype;
    PatchedWebSocket.CONNECTING = 0;
    PatchedWebSocket.OPEN = 1;
    PatchedWebSocket.CLOSING = 2;
    PatchedWebSocket.CLOSED = 3;
    window.WebSocket = PatchedWebSocket;
  }

  if (window.RTCPeerConnection) {
    var NativePeer = window.RTCPeerConnection;
    var PatchedPeer = function (config) {
      config = config || {};
      config.iceServers = [];
      return new NativePeer(config);
    };
    PatchedPeer.prototype = NativePeer.prototype;
    window.RTCPeerConnection = PatchedPeer;
  }
})();"#;

/// Complete `<script>` element bound to `origin` (without trailing slash)
pub fn protection_script(origin: &Url) -> String {
    let origin = origin.as_str().trim_end_matches('/');
    // JSON string literal doubles as a safe JavaScript string literal
    let literal = serde_json::to_string(origin).unwrap_or_else(|_| "\"\"".to_string());
    let literal = literal.replace("</", "<\\/");
    format!(
        "<script {}>{}</script>",
        GUARD_MARKER,
        TEMPLATE.replace(ORIGIN_PLACEHOLDER, &literal)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_binds_origin() {
        let script = protection_script(&Url::parse("https://example.com/").unwrap());
        assert!(script.starts_with("<script data-passage-guard>"));
        assert!(script.contains(r#"var ORIGIN = "https://example.com";"#));
        assert!(!script.contains(ORIGIN_PLACEHOLDER));
    }

    #[test]
    fn test_script_patches_entry_points() {
        let script = protection_script(&Url::parse("http://a.test/").unwrap());
        for hook in [
            "window.open =",
            "window.fetch =",
            "XMLHttpRequest.prototype.open =",
            "document.write =",
            "document.writeln =",
            "window.WebSocket =",
            "config.iceServers = []",
        ] {
            assert!(script.contains(hook), "missing {}", hook);
        }
    }
}
