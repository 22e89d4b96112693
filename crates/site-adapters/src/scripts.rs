//! JavaScript expressions evaluated in the destination tab.
//!
//! Every expression is a self-contained IIFE so it can go straight into `Runtime.evaluate`.
//! Strings are embedded as JSON literals.

use serde_json::Value;

const HELPERS: &str = r#"
const __visible = (el) => {
  if (!el) return false;
  const rect = el.getBoundingClientRect();
  const style = window.getComputedStyle(el);
  return rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden' && style.display !== 'none';
};
const __pick = (sel) => {
  let list;
  try { list = document.querySelectorAll(sel); } catch (err) { return null; }
  for (const el of list) { if (__visible(el)) return el; }
  return null;
};
const __require = (sel) => {
  const el = __pick(sel);
  if (!el) throw new Error('no visible element for ' + sel);
  return el;
};
const __isTextControl = (el) => el.tagName === 'TEXTAREA' || el.tagName === 'INPUT';
const __caretEnd = (el) => {
  if (__isTextControl(el)) {
    const n = el.value.length;
    el.setSelectionRange(n, n);
    return;
  }
  const range = document.createRange();
  range.selectNodeContents(el);
  range.collapse(false);
  const selection = window.getSelection();
  selection.removeAllRanges();
  selection.addRange(range);
};
"#;

pub(crate) fn literal(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

fn literal_list(items: &[String]) -> String {
    Value::Array(items.iter().cloned().map(Value::String).collect()).to_string()
}

fn wrap(body: &str) -> String {
    format!("(() => {{{HELPERS}\n{body}\n}})()")
}

pub fn probe(selectors: &[String]) -> String {
    wrap(&format!(
        "for (const sel of {list}) {{ if (__pick(sel)) return sel; }}\nreturn null;",
        list = literal_list(selectors)
    ))
}

pub fn set_value(selector: &str, text: &str) -> String {
    wrap(&format!(
        r#"const el = __require({sel});
if (!__isTextControl(el)) throw new Error('value setter needs a textarea or input');
const proto = el.tagName === 'TEXTAREA' ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
el.focus();
setter.call(el, {text});
el.dispatchEvent(new Event('input', {{ bubbles: true }}));
el.dispatchEvent(new Event('change', {{ bubbles: true }}));
return true;"#,
        sel = literal(selector),
        text = literal(text)
    ))
}

pub fn clear_editor(selector: &str) -> String {
    wrap(&format!(
        r#"const el = __require({sel});
el.focus();
if (__isTextControl(el)) {{
  el.select();
}} else {{
  const range = document.createRange();
  range.selectNodeContents(el);
  const selection = window.getSelection();
  selection.removeAllRanges();
  selection.addRange(range);
}}
document.execCommand('delete', false);
return true;"#,
        sel = literal(selector)
    ))
}

pub fn exec_insert(selector: &str, text: &str) -> String {
    wrap(&format!(
        r#"const el = __require({sel});
el.focus();
__caretEnd(el);
return document.execCommand('insertText', false, {text});"#,
        sel = literal(selector),
        text = literal(text)
    ))
}

pub fn paste(selector: &str, text: &str) -> String {
    wrap(&format!(
        r#"const el = __require({sel});
el.focus();
__caretEnd(el);
const data = new DataTransfer();
data.setData('text/plain', {text});
const event = new ClipboardEvent('paste', {{ clipboardData: data, bubbles: true, cancelable: true }});
el.dispatchEvent(event);
return event.defaultPrevented;"#,
        sel = literal(selector),
        text = literal(text)
    ))
}

pub fn read_text(selector: &str) -> String {
    wrap(&format!(
        r#"const el = __pick({sel}) || document.querySelector({sel});
if (!el) return '';
if (__isTextControl(el)) return el.value;
return el.innerText || el.textContent || '';"#,
        sel = literal(selector)
    ))
}

pub fn submit_state(selectors: &[String]) -> String {
    wrap(&format!(
        r#"for (const sel of {list}) {{
  const el = __pick(sel);
  if (!el) continue;
  const disabled = el.disabled === true
    || el.hasAttribute('disabled')
    || el.getAttribute('aria-disabled') === 'true';
  return {{ state: disabled ? 'disabled' : 'enabled', selector: sel }};
}}
return {{ state: 'missing' }};"#,
        list = literal_list(selectors)
    ))
}

pub fn click(selector: &str) -> String {
    wrap(&format!(
        "const el = __pick({sel});\nif (!el) return false;\nel.click();\nreturn true;",
        sel = literal(selector)
    ))
}

pub fn focus(selector: &str) -> String {
    wrap(&format!(
        "const el = __pick({sel});\nif (!el) return false;\nel.focus();\n__caretEnd(el);\nreturn true;",
        sel = literal(selector)
    ))
}
