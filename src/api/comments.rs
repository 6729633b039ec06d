/// Comment endpoints: listing, creation, voting
use crate::{
    auth::Viewer,
    comments::{CommentView, VoteAction, VoteTally},
    context::AppContext,
    error::ApiResult,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route(
            "/posts/:id/comments",
            get(list_comments).post(create_comment),
        )
        .route("/comments/:id/vote", post(vote_comment))
}

#[derive(Debug, Deserialize)]
struct CreateCommentForm {
    body: String,
}

#[derive(Debug, Deserialize)]
struct VoteForm {
    direction: String,
}

/// GET /posts/{id}/comments — live comments, newest first
async fn list_comments(
    State(ctx): State<AppContext>,
    viewer: Viewer,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let comments: Vec<CommentView> = ctx.comments.list_comments(viewer.id(), post_id).await?;
    Ok(Json(json!({ "comments": comments })))
}

/// POST /posts/{id}/comments — form field `body`
async fn create_comment(
    State(ctx): State<AppContext>,
    viewer: Viewer,
    Path(post_id): Path<Uuid>,
    Form(form): Form<CreateCommentForm>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let comment = ctx
        .comments
        .create_comment(viewer.id(), post_id, form.body)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": comment.id,
            "post_id": comment.post_id,
            "author_id": comment.author_id,
            "author_display_name": viewer.user.display_name,
            "body": comment.body,
            "upvotes": comment.upvotes,
            "downvotes": comment.downvotes,
            "net_votes": comment.upvotes - comment.downvotes,
            "created_at": comment.created_at,
            "expires_at": comment.expires_at,
        })),
    ))
}

/// POST /comments/{id}/vote — form field `direction ∈ {up, down, remove}`
async fn vote_comment(
    State(ctx): State<AppContext>,
    viewer: Viewer,
    Path(comment_id): Path<Uuid>,
    Form(form): Form<VoteForm>,
) -> ApiResult<Json<VoteTally>> {
    let action = VoteAction::parse(&form.direction)?;
    let tally = ctx.comments.vote(viewer.id(), comment_id, action).await?;
    Ok(Json(tally))
}
