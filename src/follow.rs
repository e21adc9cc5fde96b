use actix_web::{web, HttpResponse};
use diesel::prelude::*;
use crate::AppState;
use crate::auth::{find_user_by_username, CurrentUser};
use crate::common::db;
use crate::common::errors::AppError;
use crate::common::flash::{redirect_with, FlashCategory};
use crate::models::models::Follow;
use crate::schema::follows;

/// Adds `follower_id -> followed_id`; an existing pair is left as is.
pub fn follow_user(conn: &mut SqliteConnection, follower_id: i32, followed_id: i32) -> QueryResult<()> {
    diesel::insert_or_ignore_into(follows::table)
        .values(&Follow { follower_id, followed_id })
        .execute(conn)?;
    Ok(())
}

pub fn unfollow_user(conn: &mut SqliteConnection, follower_id: i32, followed_id: i32) -> QueryResult<()> {
    diesel::delete(
        follows::table
            .filter(follows::follower_id.eq(follower_id))
            .filter(follows::followed_id.eq(followed_id)),
    )
    .execute(conn)?;
    Ok(())
}

/// Ids of the users `user_id` follows.
pub fn get_followings(conn: &mut SqliteConnection, user_id: i32) -> QueryResult<Vec<i32>> {
    follows::table
        .filter(follows::follower_id.eq(user_id))
        .select(follows::followed_id)
        .order(follows::followed_id.asc())
        .load(conn)
}

/// Ids of the users following `user_id`.
pub fn get_followers(conn: &mut SqliteConnection, user_id: i32) -> QueryResult<Vec<i32>> {
    follows::table
        .filter(follows::followed_id.eq(user_id))
        .select(follows::follower_id)
        .order(follows::follower_id.asc())
        .load(conn)
}

pub fn is_following(conn: &mut SqliteConnection, follower_id: i32, followed_id: i32) -> QueryResult<bool> {
    diesel::select(diesel::dsl::exists(
        follows::table
            .filter(follows::follower_id.eq(follower_id))
            .filter(follows::followed_id.eq(followed_id)),
    ))
    .get_result(conn)
}

// === HTTP Handlers ===

#[derive(Debug, Clone, Copy)]
enum FollowAction {
    Follow,
    Unfollow,
}

enum Outcome {
    UnknownUser,
    SelfTarget,
    Done,
}

async fn change_follow(
    state: web::Data<AppState>,
    user: CurrentUser,
    username: String,
    action: FollowAction,
) -> Result<HttpResponse, AppError> {
    let follower_id = user.0.id;
    let target_name = username.clone();

    let outcome = db::run(&state.pool, move |conn| {
        let Some(target) = find_user_by_username(conn, &target_name)? else {
            return Ok(Outcome::UnknownUser);
        };
        if target.id == follower_id {
            return Ok(Outcome::SelfTarget);
        }
        match action {
            FollowAction::Follow => follow_user(conn, follower_id, target.id)?,
            FollowAction::Unfollow => unfollow_user(conn, follower_id, target.id)?,
        }
        Ok(Outcome::Done)
    })
    .await?;

    let resp = match (outcome, action) {
        (Outcome::UnknownUser, _) => redirect_with("/feed", FlashCategory::Danger, "User not found."),
        (Outcome::SelfTarget, FollowAction::Follow) => {
            redirect_with("/feed", FlashCategory::Danger, "You cannot follow yourself.")
        }
        (Outcome::SelfTarget, FollowAction::Unfollow) => {
            redirect_with("/feed", FlashCategory::Danger, "You cannot unfollow yourself.")
        }
        (Outcome::Done, FollowAction::Follow) => {
            tracing::info!(user_id = follower_id, target = %username, "followed user");
            redirect_with("/feed", FlashCategory::Success, format!("You are now following {}.", username))
        }
        (Outcome::Done, FollowAction::Unfollow) => {
            tracing::info!(user_id = follower_id, target = %username, "unfollowed user");
            redirect_with("/feed", FlashCategory::Success, format!("You have unfollowed {}.", username))
        }
    };
    Ok(resp)
}

pub async fn handle_follow(
    state: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    change_follow(state, user, path.into_inner(), FollowAction::Follow).await
}

pub async fn handle_unfollow(
    state: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    change_follow(state, user, path.into_inner(), FollowAction::Unfollow).await
}
