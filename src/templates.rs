use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse};
use rust_embed::RustEmbed;
use crate::common::flash::{pending_messages, removal_cookie};
use crate::models::models::{FeedEntry, User};

#[derive(RustEmbed)]
#[folder = "templates"]
struct Templates;

fn load(name: &str) -> anyhow::Result<String> {
    let file = Templates::get(name)
        .ok_or_else(|| anyhow::anyhow!("Template {} not found", name))?;
    Ok(String::from_utf8(file.data.to_vec())?)
}

/// Replaces `{{key}}` placeholders in a single scan of `template`; inserted
/// values are never scanned again. Values are inserted verbatim, so callers
/// escape user text first. Unknown keys are left as written.
fn fill(template: &str, vars: &[(&str, String)]) -> String {
    let mut html = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        html.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            rest = &rest[start..];
            break;
        };
        let key = &after[..end];
        match vars.iter().find(|(k, _)| *k == key) {
            Some((_, value)) => html.push_str(value),
            None => html.push_str(&rest[start..start + end + 4]),
        }
        rest = &after[end + 2..];
    }
    html.push_str(rest);
    html
}

fn text(value: &str) -> String {
    html_escape::encode_text(value).to_string()
}

fn attr(value: &str) -> String {
    html_escape::encode_double_quoted_attribute(value).to_string()
}

fn user_href(username: &str) -> String {
    attr(&format!("/user/{}", urlencoding::encode(username)))
}

fn nav(user: Option<&User>) -> String {
    match user {
        Some(u) => format!(
            r#"<a href="/feed">Feed</a>
            <a href="/upload">Upload</a>
            <a href="/account">{}</a>
            <form class="search" action="/search" method="get"><input type="search" name="q" placeholder="Search users"></form>
            <a href="/logout">Log out</a>"#,
            text(&u.username)
        ),
        None => r#"<a href="/login">Log in</a>
            <a href="/register">Register</a>"#
            .to_string(),
    }
}

fn flashes(req: &HttpRequest) -> String {
    pending_messages(req)
        .iter()
        .map(|f| {
            format!(
                r#"<div class="flash {}">{}</div>"#,
                f.category.css_class(),
                text(&f.message)
            )
        })
        .collect()
}

/// Wraps `content` in the layout, showing and consuming any pending flash.
fn page(req: &HttpRequest, user: Option<&User>, title: &str, content: &str) -> anyhow::Result<HttpResponse> {
    let layout = load("layout.html")?;
    let html = fill(
        &layout,
        &[
            ("title", text(title)),
            ("nav", nav(user)),
            ("flashes", flashes(req)),
            ("content", content.to_string()),
        ],
    );

    let mut resp = HttpResponse::Ok();
    resp.content_type("text/html; charset=utf-8");
    if req.cookie(crate::config::FLASH_COOKIE).is_some() {
        resp.cookie(removal_cookie());
    }
    Ok(resp.body(html))
}

fn post_card(entry: &FeedEntry, deletable: bool) -> String {
    let delete_form = if deletable {
        format!(
            r#"<form action="/delete_post/{}" method="post"><button type="submit" class="danger">Delete</button></form>"#,
            entry.post.id
        )
    } else {
        String::new()
    };
    format!(
        r#"<article class="post">
            <img src="/uploads/{file}" alt="Photo by {author}">
            <footer>
                <a href="{href}">{author}</a>
                <time datetime="{iso}">{when}</time>
                {delete_form}
            </footer>
        </article>"#,
        file = attr(&urlencoding::encode(&entry.post.image_file)),
        author = text(&entry.author),
        href = user_href(&entry.author),
        iso = entry.post.timestamp.format("%Y-%m-%dT%H:%M:%SZ"),
        when = entry.post.timestamp.format("%Y-%m-%d %H:%M"),
        delete_form = delete_form,
    )
}

fn post_list(entries: &[FeedEntry], viewer_id: i32, empty: &str) -> String {
    if entries.is_empty() {
        return format!(r#"<p class="empty">{}</p>"#, text(empty));
    }
    entries
        .iter()
        .map(|e| post_card(e, e.post.user_id == viewer_id))
        .collect()
}

fn follow_link(username: &str, following: bool) -> String {
    let encoded = attr(&urlencoding::encode(username));
    if following {
        format!(r#"<a class="button" href="/unfollow/{}">Unfollow</a>"#, encoded)
    } else {
        format!(r#"<a class="button" href="/follow/{}">Follow</a>"#, encoded)
    }
}

pub fn render_login(req: &HttpRequest) -> anyhow::Result<HttpResponse> {
    page(req, None, "Log in", &load("login.html")?)
}

pub fn render_register(req: &HttpRequest) -> anyhow::Result<HttpResponse> {
    page(req, None, "Register", &load("register.html")?)
}

pub fn render_home(req: &HttpRequest, user: &User) -> anyhow::Result<HttpResponse> {
    let body = fill(&load("home.html")?, &[("username", text(&user.username))]);
    page(req, Some(user), "Home", &body)
}

pub fn render_upload(req: &HttpRequest, user: &User) -> anyhow::Result<HttpResponse> {
    page(req, Some(user), "Upload", &load("upload.html")?)
}

pub fn render_change_username(req: &HttpRequest, user: &User) -> anyhow::Result<HttpResponse> {
    let body = fill(&load("change_username.html")?, &[("username", attr(&user.username))]);
    page(req, Some(user), "Change username", &body)
}

pub fn render_feed(req: &HttpRequest, user: &User, entries: &[FeedEntry]) -> anyhow::Result<HttpResponse> {
    let posts = post_list(entries, user.id, "Nothing here yet. Upload a photo or follow someone.");
    let body = fill(&load("feed.html")?, &[("posts", posts)]);
    page(req, Some(user), "Feed", &body)
}

pub struct AccountView<'a> {
    pub user: &'a User,
    pub posts: &'a [FeedEntry],
    pub followers: usize,
    pub following: usize,
}

pub fn render_account(req: &HttpRequest, view: &AccountView<'_>) -> anyhow::Result<HttpResponse> {
    let user = view.user;
    let posts = post_list(view.posts, user.id, "You have not uploaded any photos yet.");
    let body = fill(
        &load("account.html")?,
        &[
            ("username", text(&user.username)),
            ("email", text(&user.email)),
            ("first_name", text(&user.first_name)),
            ("last_name", text(&user.last_name)),
            ("followers", view.followers.to_string()),
            ("following", view.following.to_string()),
            ("posts", posts),
        ],
    );
    page(req, Some(user), "Account", &body)
}

pub struct ProfileView<'a> {
    pub viewer: &'a User,
    pub user: &'a User,
    pub posts: &'a [FeedEntry],
    pub followers: usize,
    pub following: usize,
    pub is_following: bool,
}

pub fn render_profile(req: &HttpRequest, view: &ProfileView<'_>) -> anyhow::Result<HttpResponse> {
    let action = if view.viewer.id == view.user.id {
        String::new()
    } else {
        follow_link(&view.user.username, view.is_following)
    };
    let posts = post_list(view.posts, view.viewer.id, "No photos yet.");
    let body = fill(
        &load("profile.html")?,
        &[
            ("username", text(&view.user.username)),
            ("followers", view.followers.to_string()),
            ("following", view.following.to_string()),
            ("follow_link", action),
            ("posts", posts),
        ],
    );
    page(req, Some(view.viewer), &view.user.username, &body)
}

/// `results` pairs each matched user with whether the viewer follows them.
pub fn render_search(req: &HttpRequest, viewer: &User, query: &str, results: &[(User, bool)]) -> anyhow::Result<HttpResponse> {
    let rows: String = if results.is_empty() {
        r#"<li class="empty">No users found.</li>"#.to_string()
    } else {
        results
            .iter()
            .map(|(u, following)| {
                let action = if u.id == viewer.id {
                    r#"<span class="muted">you</span>"#.to_string()
                } else {
                    follow_link(&u.username, *following)
                };
                format!(
                    r#"<li class="user"><a href="{}">{}</a> {}</li>"#,
                    user_href(&u.username),
                    text(&u.username),
                    action
                )
            })
            .collect()
    };
    let body = fill(
        &load("search_results.html")?,
        &[("query", text(query)), ("results", rows)],
    );
    page(req, Some(viewer), "Search", &body)
}

/// Standalone page for error responses; falls back to plain text if the
/// template itself is unavailable.
pub fn render_error_page(status: StatusCode, message: &str) -> String {
    let status_line = format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Error")
    );
    match load("error.html") {
        Ok(template) => fill(
            &template,
            &[("status", text(&status_line)), ("message", text(message))],
        ),
        Err(_) => format!("{}: {}", status_line, message),
    }
}
