use actix_web::{web, HttpRequest, HttpResponse};
use diesel::prelude::*;
use serde::Deserialize;
use crate::AppState;
use crate::auth::{find_user_by_username, CurrentUser};
use crate::common::db;
use crate::common::errors::AppError;
use crate::common::flash::{redirect, redirect_with, FlashCategory};
use crate::common::helpers::is_valid_username;
use crate::follow::{get_followers, get_followings, is_following};
use crate::models::models::User;
use crate::posts::get_user_posts;
use crate::schema::users;
use crate::templates::{
    render_account, render_change_username, render_home, render_profile, render_search, AccountView,
    ProfileView,
};

/// Usernames containing `fragment`. Matching follows SQLite `LIKE`, so it
/// ignores ASCII case; `%` and `_` in the fragment match literally.
pub fn search_users(conn: &mut SqliteConnection, fragment: &str) -> QueryResult<Vec<User>> {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    users::table
        .filter(users::username.like(format!("%{}%", escaped)).escape('\\'))
        .order(users::username.asc())
        .select(User::as_select())
        .load(conn)
}

pub fn rename_user(conn: &mut SqliteConnection, user_id: i32, new_username: &str) -> QueryResult<usize> {
    diesel::update(users::table.find(user_id))
        .set(users::username.eq(new_username))
        .execute(conn)
}

pub async fn home(req: HttpRequest, user: CurrentUser) -> Result<HttpResponse, AppError> {
    Ok(render_home(&req, &user.0)?)
}

pub async fn account(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: CurrentUser,
) -> Result<HttpResponse, AppError> {
    let user_id = user.0.id;
    let (posts, followers, following) = db::run(&state.pool, move |conn| {
        let posts = get_user_posts(conn, user_id)?;
        let followers = get_followers(conn, user_id)?.len();
        let following = get_followings(conn, user_id)?.len();
        Ok((posts, followers, following))
    })
    .await?;

    Ok(render_account(
        &req,
        &AccountView {
            user: &user.0,
            posts: &posts,
            followers,
            following,
        },
    )?)
}

pub async fn change_username_form(req: HttpRequest, user: CurrentUser) -> Result<HttpResponse, AppError> {
    Ok(render_change_username(&req, &user.0)?)
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct ChangeUsernameForm {
    pub new_username: String,
}

pub async fn change_username(
    state: web::Data<AppState>,
    user: CurrentUser,
    form: web::Form<ChangeUsernameForm>,
) -> Result<HttpResponse, AppError> {
    let new_username = form.into_inner().new_username.trim().to_string();
    if !is_valid_username(&new_username) {
        return Ok(redirect_with(
            "/change_username",
            FlashCategory::Danger,
            "Username must be 3-50 characters without spaces or slashes.",
        ));
    }

    let user_id = user.0.id;
    let name = new_username.clone();
    let renamed = db::run(&state.pool, move |conn| {
        conn.immediate_transaction::<_, AppError, _>(|conn| {
            if find_user_by_username(conn, &name)?.is_some() {
                return Ok(false);
            }
            rename_user(conn, user_id, &name)?;
            Ok(true)
        })
    })
    .await?;

    if !renamed {
        return Ok(redirect_with(
            "/change_username",
            FlashCategory::Danger,
            "Username already taken. Please choose another one.",
        ));
    }

    tracing::info!(user_id, old = %user.0.username, new = %new_username, "username changed");
    Ok(redirect_with("/account", FlashCategory::Success, "Your username has been updated."))
}

#[derive(Deserialize, Debug, Default)]
pub struct SearchQuery {
    pub q: Option<String>,
}

pub async fn search(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: CurrentUser,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, AppError> {
    let Some(q) = query.into_inner().q.filter(|q| !q.is_empty()) else {
        return Ok(redirect("/feed"));
    };

    let viewer_id = user.0.id;
    let fragment = q.clone();
    let results = db::run(&state.pool, move |conn| {
        let found = search_users(conn, &fragment)?;
        let followings = get_followings(conn, viewer_id)?;
        Ok(found
            .into_iter()
            .map(|u| {
                let following = followings.contains(&u.id);
                (u, following)
            })
            .collect::<Vec<_>>())
    })
    .await?;

    Ok(render_search(&req, &user.0, &q, &results)?)
}

pub async fn profile(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let username = path.into_inner();
    let viewer_id = user.0.id;

    let found = db::run(&state.pool, move |conn| {
        let Some(target) = find_user_by_username(conn, &username)? else {
            return Ok(None);
        };
        let posts = get_user_posts(conn, target.id)?;
        let followers = get_followers(conn, target.id)?.len();
        let following = get_followings(conn, target.id)?.len();
        let viewer_follows = is_following(conn, viewer_id, target.id)?;
        Ok(Some((target, posts, followers, following, viewer_follows)))
    })
    .await?;

    let Some((target, posts, followers, following, viewer_follows)) = found else {
        return Err(AppError::NotFound("User not found".to_string()));
    };

    Ok(render_profile(
        &req,
        &ProfileView {
            viewer: &user.0,
            user: &target,
            posts: &posts,
            followers,
            following,
            is_following: viewer_follows,
        },
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::db::{establish_pool, run_migrations};
    use crate::models::models::NewUser;

    fn conn_with_users(names: &[&str]) -> diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<SqliteConnection>> {
        let path = std::env::temp_dir().join(format!("photofeed-users-{}.sqlite", uuid::Uuid::new_v4()));
        let pool = establish_pool(path.to_str().unwrap(), 1).unwrap();
        run_migrations(&pool).unwrap();
        let mut conn = pool.get().unwrap();
        for name in names {
            let email = format!("{}@example.com", name);
            diesel::insert_into(users::table)
                .values(&NewUser {
                    username: name,
                    email: &email,
                    password: "x",
                    first_name: "",
                    last_name: "",
                })
                .execute(&mut conn)
                .unwrap();
        }
        conn
    }

    #[test]
    fn search_treats_wildcards_literally() {
        let mut conn = conn_with_users(&["alice", "al_ce", "bob"]);
        let names = |v: Vec<User>| v.into_iter().map(|u| u.username).collect::<Vec<_>>();

        assert_eq!(names(search_users(&mut conn, "l_c").unwrap()), vec!["al_ce"]);
        assert_eq!(names(search_users(&mut conn, "%").unwrap()), Vec::<String>::new());
        assert_eq!(names(search_users(&mut conn, "ALI").unwrap()), vec!["alice"]);
        assert_eq!(names(search_users(&mut conn, "o").unwrap()), vec!["bob"]);
    }

    #[test]
    fn rename_changes_only_that_user() {
        let mut conn = conn_with_users(&["alice", "bob"]);
        let alice = find_user_by_username(&mut conn, "alice").unwrap().unwrap();
        rename_user(&mut conn, alice.id, "alicia").unwrap();
        assert!(find_user_by_username(&mut conn, "alice").unwrap().is_none());
        assert_eq!(find_user_by_username(&mut conn, "alicia").unwrap().unwrap().id, alice.id);
        assert!(find_user_by_username(&mut conn, "bob").unwrap().is_some());
    }
}
