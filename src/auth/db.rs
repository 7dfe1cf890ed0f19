use crate::database::Database;
use crate::error::Error;

const TOKEN: &str = "token";

#[tracing::instrument(skip(db))]
pub async fn fetch_token(db: &dyn Database) -> Result<Option<String>, Error> {
    db.get_item(TOKEN).await
}

#[tracing::instrument(skip(db, token))]
pub async fn store_token(db: &dyn Database, token: &str) -> Result<(), Error> {
    db.set_item(TOKEN, token.to_owned()).await
}

#[tracing::instrument(skip(db))]
pub async fn remove_token(db: &dyn Database) -> Result<(), Error> {
    db.remove_item(TOKEN).await
}

/// Token presence is the only thing that gates the dashboard.
#[tracing::instrument(skip(db))]
pub async fn assert_authenticated(db: &dyn Database) -> Result<String, Error> {
    fetch_token(db).await?.ok_or(Error::NotAuthenticated)
}
