use chrono::NaiveDateTime;
use diesel::prelude::*;
use crate::schema::{follows, posts, sessions, users};

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string.
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone, PartialEq)]
#[diesel(belongs_to(User))]
#[diesel(table_name = posts)]
pub struct Post {
    pub id: i32,
    pub image_file: String,
    pub timestamp: NaiveDateTime,
    pub user_id: i32,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = posts)]
pub struct NewPost<'a> {
    pub image_file: &'a str,
    pub timestamp: NaiveDateTime,
    pub user_id: i32,
}

/// A post together with its author's current username, as shown in listings.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub post: Post,
    pub author: String,
}

#[derive(Insertable, Queryable, Selectable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = follows)]
pub struct Follow {
    pub follower_id: i32,
    pub followed_id: i32,
}

#[derive(Insertable, Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = sessions)]
pub struct Session {
    pub token: String,
    pub user_id: i32,
    pub created_at: NaiveDateTime,
}
