/// Application context and dependency wiring
use crate::{
    blob_store::{self, BlobBackend},
    comments::CommentService,
    config::ServerConfig,
    db,
    error::ApiResult,
    feed::FeedService,
    follows::FollowService,
    identity::IdentityResolver,
    posts::PostService,
    reaper::Reaper,
    users::UserStore,
};
use sqlx::PgPool;
use std::sync::Arc;

/// Shared services, constructed once at startup and passed into each
/// component explicitly.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: PgPool,
    pub blobs: Arc<dyn BlobBackend>,
    pub identity: Arc<IdentityResolver>,
    pub users: Arc<UserStore>,
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub follows: Arc<FollowService>,
    pub feed: Arc<FeedService>,
    pub reaper: Arc<Reaper>,
}

impl AppContext {
    /// Create the application context from configuration
    pub async fn new(config: ServerConfig) -> ApiResult<Self> {
        config.validate()?;

        let db = db::create_pool(&config.database).await?;
        db::test_connection(&db).await?;

        let blobs = blob_store::from_config(&config.blobstore).await?;
        let identity = Arc::new(IdentityResolver::new(&config.identity)?);

        let users = Arc::new(UserStore::new(db.clone()));
        let posts = Arc::new(PostService::new(
            db.clone(),
            Arc::clone(&blobs),
            config.service.media_upload_limit,
        ));
        let comments = Arc::new(CommentService::new(db.clone()));
        let follows = Arc::new(FollowService::new(db.clone()));
        let feed = Arc::new(FeedService::new(
            db.clone(),
            Arc::clone(&blobs),
            Arc::clone(&follows),
        ));
        let reaper = Arc::new(Reaper::new(db.clone(), config.reaper.batch_size));

        Ok(Self {
            config: Arc::new(config),
            db,
            blobs,
            identity,
            users,
            posts,
            comments,
            follows,
            feed,
            reaper,
        })
    }
}
