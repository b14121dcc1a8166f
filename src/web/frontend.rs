//! Embedded single-page chat frontend.
//!
//! The entire chat UI is contained in a single HTML constant with inline
//! CSS and JavaScript. The `{{web_name}}` placeholder is filled in by the
//! root handler. No external assets are required.

/// The complete HTML frontend as a static string.
pub const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{{web_name}}</title>
<style>
*,*::before,*::after{box-sizing:border-box;margin:0;padding:0}
:root{
  --bg:#10131a;
  --bg-panel:#161b26;
  --bg-input:#1d2433;
  --bg-user:#2b4c7e;
  --bg-assistant:#161b26;
  --text:#e6e6e6;
  --text-muted:#8b93a7;
  --accent:#4f9cf9;
  --border:#2a3245;
  --error:#e05260;
}
html,body{height:100%;font-family:-apple-system,BlinkMacSystemFont,"Segoe UI",Roboto,Helvetica,Arial,sans-serif;background:var(--bg);color:var(--text)}
body{display:flex;flex-direction:column}

.header{padding:14px 20px;text-align:center;background:var(--bg-panel);border-bottom:1px solid var(--border)}
.header h1{font-size:20px;font-weight:600}

.controls{
  display:flex;flex-wrap:wrap;gap:12px;align-items:flex-start;
  padding:12px 20px;background:var(--bg-panel);border-bottom:1px solid var(--border);
}
.control{display:flex;flex-direction:column;gap:4px}
.control label{font-size:12px;color:var(--text-muted)}
.control select,.control input[type=number]{
  background:var(--bg-input);color:var(--text);border:1px solid var(--border);
  border-radius:6px;padding:6px 8px;font-size:14px;min-width:180px;
}
.control textarea{
  background:var(--bg-input);color:var(--text);border:1px solid var(--border);
  border-radius:6px;padding:6px 8px;font-size:13px;width:340px;height:84px;resize:vertical;
}
.control input[type=file]{font-size:12px;color:var(--text-muted);max-width:220px}

.messages{flex:1;overflow-y:auto;padding:16px 20px;display:flex;flex-direction:column;gap:10px}
.message{
  max-width:760px;width:fit-content;padding:10px 14px;border-radius:10px;
  line-height:1.5;font-size:14px;white-space:pre-wrap;word-break:break-word;
}
.message.user{background:var(--bg-user);align-self:flex-end}
.message.assistant{background:var(--bg-assistant);border:1px solid var(--border);align-self:flex-start}
.message.error{border-color:var(--error);color:var(--error)}

.composer{
  display:flex;gap:10px;padding:12px 20px;background:var(--bg-panel);
  border-top:1px solid var(--border);
}
.composer textarea{
  flex:1;background:var(--bg-input);color:var(--text);border:1px solid var(--border);
  border-radius:8px;padding:10px 12px;font-size:14px;height:52px;resize:none;
}
.composer button{
  background:var(--accent);color:#fff;border:none;border-radius:8px;
  padding:0 24px;font-size:14px;font-weight:600;cursor:pointer;
}
.composer button:disabled{opacity:.5;cursor:default}
</style>
</head>
<body>
<div class="header"><h1>{{web_name}}</h1></div>

<div class="controls">
  <div class="control">
    <label for="model">Choose a model</label>
    <select id="model"></select>
  </div>
  <div class="control">
    <label for="max-tokens">Max tokens</label>
    <input id="max-tokens" type="number" step="1">
  </div>
  <div class="control">
    <label for="system-message">System Message</label>
    <textarea id="system-message" placeholder="System message..."></textarea>
  </div>
  <div class="control">
    <label for="image-input">Image</label>
    <input id="image-input" type="file" accept="image/*">
  </div>
  <div class="control">
    <label for="file-input">File</label>
    <input id="file-input" type="file">
  </div>
</div>

<div class="messages" id="messages"></div>

<div class="composer">
  <textarea id="prompt" placeholder="Type a message..."></textarea>
  <button id="send">Send</button>
</div>

<script>
const els = {
  model: document.getElementById('model'),
  maxTokens: document.getElementById('max-tokens'),
  systemMessage: document.getElementById('system-message'),
  image: document.getElementById('image-input'),
  file: document.getElementById('file-input'),
  messages: document.getElementById('messages'),
  prompt: document.getElementById('prompt'),
  send: document.getElementById('send'),
};
const uploads = { image: null, file: null };

function addBubble(kind, text) {
  const div = document.createElement('div');
  div.className = 'message ' + kind;
  div.textContent = text;
  els.messages.appendChild(div);
  els.messages.scrollTop = els.messages.scrollHeight;
  return div;
}

async function init() {
  const res = await fetch('/api/models');
  const info = await res.json();
  for (const name of info.models) {
    const opt = document.createElement('option');
    opt.value = name;
    opt.textContent = name;
    els.model.appendChild(opt);
  }
  if (info.default_model) els.model.value = info.default_model;
  els.maxTokens.min = info.min_max_tokens;
  els.maxTokens.max = info.max_max_tokens;
  els.maxTokens.value = info.default_max_tokens;
  els.systemMessage.value = info.system_message;
  await loadHistory();
}

async function loadHistory() {
  els.messages.replaceChildren();
  const res = await fetch('/api/history/' + encodeURIComponent(els.model.value));
  if (!res.ok) return;
  for (const record of await res.json()) {
    addBubble('user', record.message);
    addBubble('assistant', record.answer);
  }
}

async function uploadFile(input, slot) {
  const file = input.files[0];
  if (!file) { uploads[slot] = null; return; }
  const form = new FormData();
  form.append('file', file);
  const res = await fetch('/api/upload', { method: 'POST', body: form });
  if (res.ok) {
    uploads[slot] = (await res.json()).path;
  } else {
    uploads[slot] = null;
    input.value = '';
  }
}

async function resetInputs() {
  await fetch('/api/reset', { method: 'POST' });
  els.image.value = '';
  els.file.value = '';
  uploads.image = null;
  uploads.file = null;
}

async function consumeStream(res, bubble) {
  const reader = res.body.getReader();
  const decoder = new TextDecoder();
  let buffered = '';
  let eventName = 'message';
  for (;;) {
    const { done, value } = await reader.read();
    if (done) break;
    buffered += decoder.decode(value, { stream: true });
    let idx;
    while ((idx = buffered.indexOf('\n')) >= 0) {
      const line = buffered.slice(0, idx).trimEnd();
      buffered = buffered.slice(idx + 1);
      if (line.startsWith('event:')) {
        eventName = line.slice(6).trim();
      } else if (line.startsWith('data:')) {
        const payload = JSON.parse(line.slice(5).trim());
        if (eventName === 'delta' || eventName === 'done') {
          bubble.textContent = payload.answer;
        } else if (eventName === 'error') {
          bubble.classList.add('error');
          bubble.textContent = 'Error: ' + payload.error;
        }
        els.messages.scrollTop = els.messages.scrollHeight;
      }
    }
  }
}

async function send() {
  const message = els.prompt.value.trim();
  if (!message || els.send.disabled) return;
  els.prompt.value = '';
  els.send.disabled = true;

  addBubble('user', message);
  const bubble = addBubble('assistant', '…');

  try {
    const res = await fetch('/api/chat', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({
        model: els.model.value,
        message,
        max_tokens: Number(els.maxTokens.value) || undefined,
        system_message: els.systemMessage.value,
        image_path: uploads.image,
        file_path: uploads.file,
      }),
    });
    if (!res.ok) {
      const err = await res.json();
      bubble.classList.add('error');
      bubble.textContent = 'Error: ' + err.error;
    } else {
      await consumeStream(res, bubble);
    }
  } catch (err) {
    bubble.classList.add('error');
    bubble.textContent = 'Error: ' + err;
  } finally {
    els.send.disabled = false;
    resetInputs();
  }
}

els.model.addEventListener('change', loadHistory);
els.image.addEventListener('change', () => uploadFile(els.image, 'image'));
els.file.addEventListener('change', () => uploadFile(els.file, 'file'));
els.send.addEventListener('click', send);
els.prompt.addEventListener('keydown', (e) => {
  if (e.key === 'Enter' && !e.shiftKey) { e.preventDefault(); send(); }
});

init();
</script>
</body>
</html>
"##;
