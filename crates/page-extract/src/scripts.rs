//! In-page extraction scripts. Each evaluates to `{ title, body, meta }`.

use crate::kind::PageKind;

/// Comments kept from a Reddit thread.
pub const REDDIT_TOP_COMMENTS: usize = 20;

const ARTICLE: &str = r#"(() => {
  const pick = (sel) => document.querySelector(sel);
  const metaContent = (sel) => {
    const el = pick(sel);
    return el ? (el.getAttribute('content') || '') : '';
  };
  const root = pick('article') || pick('main') || pick('[role="main"]') || document.body;
  const heading = pick('article h1') || pick('h1');
  return {
    title: (heading && heading.innerText) || document.title || '',
    body: root ? (root.innerText || '') : '',
    meta: {
      site: metaContent('meta[property="og:site_name"]'),
      author: metaContent('meta[name="author"]'),
      description: metaContent('meta[name="description"]'),
    },
  };
})()"#;

const REDDIT: &str = r#"(() => {
  const limit = __LIMIT__;
  const text = (el) => (el ? (el.innerText || el.textContent || '').trim() : '');
  const post = document.querySelector('shreddit-post');
  if (post) {
    const comments = Array.from(document.querySelectorAll('shreddit-comment[depth="0"]'))
      .slice(0, limit)
      .map((c) => `- ${c.getAttribute('author') || 'unknown'}: ${text(c.querySelector('[slot="comment"]'))}`);
    const body = text(post.querySelector('[slot="text-body"]'));
    return {
      title: post.getAttribute('post-title') || document.title || '',
      body: [body, comments.length ? 'Comments:\n' + comments.join('\n') : ''].filter(Boolean).join('\n\n'),
      meta: {
        subreddit: post.getAttribute('subreddit-prefixed-name') || '',
        author: post.getAttribute('author') || '',
        comments: comments.length,
      },
    };
  }
  const title = text(document.querySelector('.thing.link a.title'));
  const selftext = text(document.querySelector('.thing.link .expando .md'));
  const comments = Array.from(document.querySelectorAll('.commentarea > .sitetable > .thing.comment'))
    .slice(0, limit)
    .map((c) => `- ${c.getAttribute('data-author') || 'unknown'}: ${text(c.querySelector('.entry .md'))}`);
  return {
    title: title || document.title || '',
    body: [selftext, comments.length ? 'Comments:\n' + comments.join('\n') : ''].filter(Boolean).join('\n\n'),
    meta: { subreddit: text(document.querySelector('.redditname a')), comments: comments.length },
  };
})()"#;

const FOURCHAN: &str = r#"(() => {
  const posts = Array.from(document.querySelectorAll('.postContainer'));
  const lines = posts.map((container) => {
    const id = (container.id || '').replace(/^pc/, '');
    const message = container.querySelector('.postMessage');
    const content = message ? (message.innerText || '').trim() : '';
    return content ? `No.${id}: ${content}` : '';
  }).filter(Boolean);
  const subject = document.querySelector('.opContainer .subject');
  const board = (window.location.pathname.split('/')[1]) || '';
  return {
    title: (subject && subject.textContent.trim()) || document.title || '',
    body: lines.join('\n\n'),
    meta: { board, replies: Math.max(posts.length - 1, 0) },
  };
})()"#;

const YOUTUBE: &str = r#"(() => {
  const text = (el) => (el ? (el.innerText || el.textContent || '').trim() : '');
  const heading = document.querySelector('h1.ytd-watch-metadata') || document.querySelector('#title h1');
  const segments = Array.from(document.querySelectorAll('ytd-transcript-segment-renderer .segment-text'))
    .map((el) => text(el))
    .filter(Boolean);
  let body = segments.join(' ');
  let source = 'transcript';
  if (!body) {
    source = 'description';
    body = text(document.querySelector('#description-inline-expander'))
      || text(document.querySelector('ytd-text-inline-expander'))
      || ((document.querySelector('meta[name="description"]') || {}).content || '');
  }
  return {
    title: text(heading) || document.title || '',
    body,
    meta: {
      channel: text(document.querySelector('#owner #channel-name a')),
      source,
    },
  };
})()"#;

/// JavaScript that captures the readable content of a page of `kind`.
pub fn extraction_script(kind: PageKind) -> String {
    match kind {
        PageKind::Article => ARTICLE.to_string(),
        PageKind::Reddit => REDDIT.replace("__LIMIT__", &REDDIT_TOP_COMMENTS.to_string()),
        PageKind::FourChan => FOURCHAN.to_string(),
        PageKind::YouTube => YOUTUBE.to_string(),
    }
}
