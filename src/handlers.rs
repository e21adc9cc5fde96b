use actix_web::web;
use crate::{auth, follow, posts, static_server, users};

/// Registers every route of the application.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(auth::index))
        .service(
            web::resource("/login")
                .route(web::get().to(auth::login_form))
                .route(web::post().to(auth::login_user)),
        )
        .service(
            web::resource("/register")
                .route(web::get().to(auth::register_form))
                .route(web::post().to(auth::register_user)),
        )
        .route("/logout", web::get().to(auth::logout_user))
        .route("/home", web::get().to(users::home))
        .route("/account", web::get().to(users::account))
        .service(
            web::resource("/upload")
                .route(web::get().to(posts::upload_form))
                .route(web::post().to(posts::upload_photo)),
        )
        .route("/feed", web::get().to(posts::get_feed_page))
        .route("/uploads/{filename}", web::get().to(static_server::serve_upload))
        .route("/delete_post/{id}", web::post().to(posts::delete_post))
        .service(
            web::resource("/change_username")
                .route(web::get().to(users::change_username_form))
                .route(web::post().to(users::change_username)),
        )
        .route("/follow/{username}", web::get().to(follow::handle_follow))
        .route("/unfollow/{username}", web::get().to(follow::handle_unfollow))
        .route("/search", web::get().to(users::search))
        .route("/user/{username}", web::get().to(users::profile))
        .route("/static/{path:.*}", web::get().to(static_server::serve_static));
}
