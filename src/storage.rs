use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree};
use sled::{Db, Transactional, Tree};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::error::StorageError;
use crate::models::{Account, Comment, CommentView, LikeStatus, Post, PostView, PublicAccount};

/// What an account deletion took with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeReport {
    pub posts: usize,
    pub comments: usize,
}

/// Document store over Sled. One tree per collection, plus unique indexes
/// for account email and username and ownership indexes so that cascading
/// deletes never need a scan. Cheap to clone (Sled handles are shared).
///
/// Plain `Tree` calls must not be made inside a transaction closure: Sled
/// holds its global write lock for the duration of the closure.
#[derive(Clone)]
pub struct Storage {
    db: Db,
    accounts: Tree,
    // lower-cased email -> account id
    account_emails: Tree,
    // lower-cased username -> account id
    account_usernames: Tree,
    // account id -> JSON array of post ids
    account_posts: Tree,
    posts: Tree,
    // post id -> JSON array of comment ids
    post_comments: Tree,
    comments: Tree,
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn index_key(value: &str) -> String {
    value.trim().to_lowercase()
}

fn abort(err: StorageError) -> ConflictableTransactionError<StorageError> {
    ConflictableTransactionError::Abort(err)
}

type TxResult<T> = ConflictableTransactionResult<T, StorageError>;

fn read_ids(tree: &TransactionalTree, key: &str) -> TxResult<Vec<String>> {
    match tree.get(key.as_bytes())? {
        Some(bytes) => decode(&bytes).map_err(abort),
        None => Ok(Vec::new()),
    }
}

fn write_ids(tree: &TransactionalTree, key: &str, ids: &[String]) -> TxResult<()> {
    if ids.is_empty() {
        tree.remove(key.as_bytes())?;
    } else {
        tree.insert(key.as_bytes(), encode(&ids).map_err(abort)?)?;
    }
    Ok(())
}

fn push_id(tree: &TransactionalTree, key: &str, id: &str) -> TxResult<()> {
    let mut ids = read_ids(tree, key)?;
    ids.push(id.to_string());
    write_ids(tree, key, &ids)
}

fn drop_id(tree: &TransactionalTree, key: &str, id: &str) -> TxResult<()> {
    let mut ids = read_ids(tree, key)?;
    ids.retain(|existing| existing != id);
    write_ids(tree, key, &ids)
}

impl Storage {
    /// Open or create the Sled database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// In-memory database removed on drop.
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, StorageError> {
        Ok(Self {
            accounts: db.open_tree("accounts")?,
            account_emails: db.open_tree("account_emails")?,
            account_usernames: db.open_tree("account_usernames")?,
            account_posts: db.open_tree("account_posts")?,
            posts: db.open_tree("posts")?,
            post_comments: db.open_tree("post_comments")?,
            comments: db.open_tree("comments")?,
            db,
        })
    }

    /// Flush dirty pages to disk; called on shutdown.
    pub fn flush(&self) -> Result<usize, StorageError> {
        Ok(self.db.flush()?)
    }

    // --- Accounts ---

    /// Insert a new account. Email and username uniqueness is checked in the
    /// same transaction as the write.
    pub fn create_account(&self, account: &Account) -> Result<(), StorageError> {
        let bytes = encode(account)?;
        let email_key = index_key(&account.email);
        let username_key = index_key(&account.username);

        (&self.accounts, &self.account_emails, &self.account_usernames).transaction(
            |(accounts, emails, usernames)| -> TxResult<()> {
                if emails.get(email_key.as_bytes())?.is_some() {
                    return Err(abort(StorageError::DuplicateEmail));
                }
                if usernames.get(username_key.as_bytes())?.is_some() {
                    return Err(abort(StorageError::DuplicateUsername));
                }
                accounts.insert(account.id.as_bytes(), bytes.as_slice())?;
                emails.insert(email_key.as_bytes(), account.id.as_bytes())?;
                usernames.insert(username_key.as_bytes(), account.id.as_bytes())?;
                Ok(())
            },
        )?;
        Ok(())
    }

    pub fn get_account(&self, id: &str) -> Result<Option<Account>, StorageError> {
        match self.accounts.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StorageError> {
        match self.account_emails.get(index_key(email).as_bytes())? {
            Some(id) => self.get_account(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    /// All accounts, oldest first.
    pub fn list_accounts(&self) -> Result<Vec<Account>, StorageError> {
        let mut accounts: Vec<Account> = self.scan(&self.accounts)?;
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(accounts)
    }

    /// Overwrite an account, moving the email/username index entries when
    /// they differ from what is currently stored.
    pub fn update_account(&self, updated: &Account) -> Result<(), StorageError> {
        let bytes = encode(updated)?;
        let new_email = index_key(&updated.email);
        let new_username = index_key(&updated.username);
        let id = updated.id.as_bytes();

        (&self.accounts, &self.account_emails, &self.account_usernames).transaction(
            |(accounts, emails, usernames)| -> TxResult<()> {
                let stored: Account = match accounts.get(id)? {
                    Some(bytes) => decode(&bytes).map_err(abort)?,
                    None => return Err(abort(StorageError::Missing("account"))),
                };
                let old_email = index_key(&stored.email);
                if old_email != new_email {
                    if emails.get(new_email.as_bytes())?.is_some_and(|owner| &*owner != id) {
                        return Err(abort(StorageError::DuplicateEmail));
                    }
                    emails.remove(old_email.as_bytes())?;
                    emails.insert(new_email.as_bytes(), id)?;
                }
                let old_username = index_key(&stored.username);
                if old_username != new_username {
                    if usernames.get(new_username.as_bytes())?.is_some_and(|owner| &*owner != id) {
                        return Err(abort(StorageError::DuplicateUsername));
                    }
                    usernames.remove(old_username.as_bytes())?;
                    usernames.insert(new_username.as_bytes(), id)?;
                }
                accounts.insert(id, bytes.as_slice())?;
                Ok(())
            },
        )?;
        Ok(())
    }

    /// Delete an account together with every post it owns and the comments
    /// on those posts, all in one transaction.
    pub fn delete_account_cascade(&self, id: &str) -> Result<CascadeReport, StorageError> {
        let trees = (
            &self.accounts,
            &self.account_emails,
            &self.account_usernames,
            &self.account_posts,
            &self.posts,
            &self.post_comments,
            &self.comments,
        );
        let report = trees.transaction(
            |(accounts, emails, usernames, account_posts, posts, post_comments, comments)| -> TxResult<CascadeReport> {
                let account: Account = match accounts.get(id.as_bytes())? {
                    Some(bytes) => decode(&bytes).map_err(abort)?,
                    None => return Err(abort(StorageError::Missing("account"))),
                };

                let post_ids = read_ids(account_posts, id)?;
                let mut removed_comments = 0;
                for post_id in &post_ids {
                    for comment_id in read_ids(post_comments, post_id)? {
                        comments.remove(comment_id.as_bytes())?;
                        removed_comments += 1;
                    }
                    post_comments.remove(post_id.as_bytes())?;
                    posts.remove(post_id.as_bytes())?;
                }
                account_posts.remove(id.as_bytes())?;
                emails.remove(index_key(&account.email).as_bytes())?;
                usernames.remove(index_key(&account.username).as_bytes())?;
                accounts.remove(id.as_bytes())?;
                Ok(CascadeReport {
                    posts: post_ids.len(),
                    comments: removed_comments,
                })
            },
        )?;
        Ok(report)
    }

    // --- Posts ---

    /// Insert a post; its author must still exist.
    pub fn create_post(&self, post: &Post) -> Result<(), StorageError> {
        let bytes = encode(post)?;
        (&self.accounts, &self.account_posts, &self.posts).transaction(
            |(accounts, account_posts, posts)| -> TxResult<()> {
                if accounts.get(post.author_id.as_bytes())?.is_none() {
                    return Err(abort(StorageError::Missing("account")));
                }
                posts.insert(post.id.as_bytes(), bytes.as_slice())?;
                push_id(account_posts, &post.author_id, &post.id)
            },
        )?;
        Ok(())
    }

    pub fn get_post(&self, id: &str) -> Result<Option<Post>, StorageError> {
        match self.posts.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All posts, newest first.
    pub fn list_posts(&self) -> Result<Vec<Post>, StorageError> {
        let mut posts: Vec<Post> = self.scan(&self.posts)?;
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    /// Overwrite an existing post. Last write wins.
    pub fn update_post(&self, post: &Post) -> Result<(), StorageError> {
        let bytes = encode(post)?;
        self.posts.transaction(|posts| -> TxResult<()> {
            if posts.get(post.id.as_bytes())?.is_none() {
                return Err(abort(StorageError::Missing("post")));
            }
            posts.insert(post.id.as_bytes(), bytes.as_slice())?;
            Ok(())
        })?;
        Ok(())
    }

    /// Delete a post and its comments. Returns the number of comments removed.
    pub fn delete_post(&self, id: &str) -> Result<usize, StorageError> {
        let removed = (&self.account_posts, &self.posts, &self.post_comments, &self.comments).transaction(
            |(account_posts, posts, post_comments, comments)| -> TxResult<usize> {
                let post: Post = match posts.remove(id.as_bytes())? {
                    Some(bytes) => decode(&bytes).map_err(abort)?,
                    None => return Err(abort(StorageError::Missing("post"))),
                };
                drop_id(account_posts, &post.author_id, id)?;
                let comment_ids = read_ids(post_comments, id)?;
                for comment_id in &comment_ids {
                    comments.remove(comment_id.as_bytes())?;
                }
                post_comments.remove(id.as_bytes())?;
                Ok(comment_ids.len())
            },
        )?;
        Ok(removed)
    }

    /// Flip `account_id`'s membership in the post's like set. The account
    /// must still exist.
    pub fn toggle_like(&self, post_id: &str, account_id: &str) -> Result<LikeStatus, StorageError> {
        let status = (&self.accounts, &self.posts).transaction(|(accounts, posts)| -> TxResult<LikeStatus> {
            if accounts.get(account_id.as_bytes())?.is_none() {
                return Err(abort(StorageError::Missing("account")));
            }
            let mut post: Post = match posts.get(post_id.as_bytes())? {
                Some(bytes) => decode(&bytes).map_err(abort)?,
                None => return Err(abort(StorageError::Missing("post"))),
            };
            let liked = if post.likes.remove(account_id) {
                false
            } else {
                post.likes.insert(account_id.to_string());
                true
            };
            let bytes = encode(&post).map_err(abort)?;
            posts.insert(post_id.as_bytes(), bytes)?;
            Ok(LikeStatus {
                liked,
                likes: post.likes.len(),
            })
        })?;
        Ok(status)
    }

    // --- Comments ---

    /// Insert a comment; both its author and its post must exist.
    pub fn create_comment(&self, comment: &Comment) -> Result<(), StorageError> {
        let bytes = encode(comment)?;
        (&self.accounts, &self.posts, &self.post_comments, &self.comments).transaction(
            |(accounts, posts, post_comments, comments)| -> TxResult<()> {
                if accounts.get(comment.author_id.as_bytes())?.is_none() {
                    return Err(abort(StorageError::Missing("account")));
                }
                if posts.get(comment.post_id.as_bytes())?.is_none() {
                    return Err(abort(StorageError::Missing("post")));
                }
                comments.insert(comment.id.as_bytes(), bytes.as_slice())?;
                push_id(post_comments, &comment.post_id, &comment.id)
            },
        )?;
        Ok(())
    }

    pub fn get_comment(&self, id: &str) -> Result<Option<Comment>, StorageError> {
        match self.comments.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Comments on a post, oldest first.
    pub fn comments_for_post(&self, post_id: &str) -> Result<Vec<Comment>, StorageError> {
        let ids: Vec<String> = match self.post_comments.get(post_id.as_bytes())? {
            Some(bytes) => decode(&bytes)?,
            None => return Ok(Vec::new()),
        };
        let mut comments = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(comment) = self.get_comment(&id)? {
                comments.push(comment);
            }
        }
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments)
    }

    pub fn delete_comment(&self, id: &str) -> Result<(), StorageError> {
        (&self.post_comments, &self.comments).transaction(
            |(post_comments, comments)| -> TxResult<()> {
                let comment: Comment = match comments.remove(id.as_bytes())? {
                    Some(bytes) => decode(&bytes).map_err(abort)?,
                    None => return Err(abort(StorageError::Missing("comment"))),
                };
                drop_id(post_comments, &comment.post_id, id)
            },
        )?;
        Ok(())
    }

    // --- Relationship expansion ---

    pub fn populate_post(&self, post: Post) -> Result<PostView, StorageError> {
        let author = self.get_account(&post.author_id)?.map(|a| a.public());
        Ok(PostView { post, author })
    }

    pub fn populate_posts(&self, posts: Vec<Post>) -> Result<Vec<PostView>, StorageError> {
        let mut authors = AuthorCache::new(self);
        posts
            .into_iter()
            .map(|post| -> Result<PostView, StorageError> {
                let author = authors.get(&post.author_id)?;
                Ok(PostView { post, author })
            })
            .collect()
    }

    pub fn populate_comments(&self, comments: Vec<Comment>) -> Result<Vec<CommentView>, StorageError> {
        let mut authors = AuthorCache::new(self);
        comments
            .into_iter()
            .map(|comment| -> Result<CommentView, StorageError> {
                let author = authors.get(&comment.author_id)?;
                Ok(CommentView { comment, author })
            })
            .collect()
    }

    fn scan<T: DeserializeOwned>(&self, tree: &Tree) -> Result<Vec<T>, StorageError> {
        let mut docs = vec![];
        for item in tree.iter() {
            let (_, value) = item?;
            docs.push(decode(&value)?);
        }
        Ok(docs)
    }
}

/// Memoizes author lookups while expanding a listing.
struct AuthorCache<'a> {
    storage: &'a Storage,
    seen: HashMap<String, Option<PublicAccount>>,
}

impl<'a> AuthorCache<'a> {
    fn new(storage: &'a Storage) -> Self {
        Self {
            storage,
            seen: HashMap::new(),
        }
    }

    fn get(&mut self, id: &str) -> Result<Option<PublicAccount>, StorageError> {
        if let Some(cached) = self.seen.get(id) {
            return Ok(cached.clone());
        }
        let author = self.storage.get_account(id)?.map(|a| a.public());
        self.seen.insert(id.to_string(), author.clone());
        Ok(author)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, PhotoSettings};
    use chrono::{Duration, Utc};
    use std::collections::BTreeSet;

    fn account(id: &str, username: &str, email: &str) -> Account {
        let now = Utc::now();
        Account {
            id: id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$2b$10$notarealhash".to_string(),
            image_url: None,
            web: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn post(id: &str, author: &Account) -> Post {
        let now = Utc::now();
        Post {
            id: id.to_string(),
            title: format!("Post {id}"),
            description: "A long enough description".to_string(),
            image_url: "https://img.example/p.jpg".to_string(),
            category: Category::Photography,
            photo: PhotoSettings::default(),
            author_id: author.id.clone(),
            author_name: author.username.clone(),
            likes: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn comment(id: &str, post_id: &str, author: &Account) -> Comment {
        let now = Utc::now();
        Comment {
            id: id.to_string(),
            post_id: post_id.to_string(),
            author_id: author.id.clone(),
            text: "Nice light".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn account_lookup_by_id_and_email() {
        let storage = Storage::temporary().expect("Failed to open storage");
        let ana = account("a1", "ana", "Ana@X.com");
        storage.create_account(&ana).unwrap();

        assert_eq!(storage.get_account("a1").unwrap(), Some(ana.clone()));
        assert_eq!(storage.find_account_by_email("ana@x.com").unwrap(), Some(ana));
        assert_eq!(storage.find_account_by_email("nobody@x.com").unwrap(), None);
    }

    #[test]
    fn duplicate_email_or_username_rejected() {
        let storage = Storage::temporary().unwrap();
        let ana = account("a1", "ana", "a@x.com");
        storage.create_account(&ana).unwrap();

        let same_email = account("a2", "bob", "A@x.com");
        assert!(matches!(
            storage.create_account(&same_email),
            Err(StorageError::DuplicateEmail)
        ));
        let same_name = account("a3", "ANA", "other@x.com");
        assert!(matches!(
            storage.create_account(&same_name),
            Err(StorageError::DuplicateUsername)
        ));

        assert_eq!(storage.list_accounts().unwrap(), vec![ana]);
        assert_eq!(storage.get_account("a2").unwrap(), None);
    }

    #[test]
    fn update_account_moves_indexes() {
        let storage = Storage::temporary().unwrap();
        let ana = account("a1", "ana", "a@x.com");
        let bob = account("b1", "bob", "b@x.com");
        storage.create_account(&ana).unwrap();
        storage.create_account(&bob).unwrap();

        let mut renamed = ana.clone();
        renamed.email = "ana@new.com".to_string();
        storage.update_account(&renamed).unwrap();
        assert_eq!(storage.find_account_by_email("a@x.com").unwrap(), None);
        assert_eq!(
            storage.find_account_by_email("ana@new.com").unwrap().map(|a| a.id),
            Some("a1".to_string())
        );

        let mut clash = renamed.clone();
        clash.username = "bob".to_string();
        assert!(matches!(
            storage.update_account(&clash),
            Err(StorageError::DuplicateUsername)
        ));
        assert_eq!(storage.get_account("a1").unwrap().unwrap().username, "ana");
    }

    #[test]
    fn cascade_removes_owned_posts_and_their_comments() {
        let storage = Storage::temporary().unwrap();
        let ana = account("a1", "ana", "a@x.com");
        let bob = account("b1", "bob", "b@x.com");
        storage.create_account(&ana).unwrap();
        storage.create_account(&bob).unwrap();
        storage.create_post(&post("p1", &ana)).unwrap();
        storage.create_post(&post("p2", &ana)).unwrap();
        storage.create_post(&post("p3", &bob)).unwrap();
        storage.create_comment(&comment("c1", "p1", &bob)).unwrap();
        storage.create_comment(&comment("c2", "p3", &ana)).unwrap();

        let report = storage.delete_account_cascade("a1").unwrap();
        assert_eq!(report, CascadeReport { posts: 2, comments: 1 });

        assert_eq!(storage.get_account("a1").unwrap(), None);
        assert_eq!(storage.find_account_by_email("a@x.com").unwrap(), None);
        let remaining: Vec<String> = storage.list_posts().unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(remaining, vec!["p3".to_string()]);
        assert_eq!(storage.get_comment("c1").unwrap(), None);
        assert!(storage.get_comment("c2").unwrap().is_some());

        // The freed email can be registered again.
        storage.create_account(&account("a9", "ana", "a@x.com")).unwrap();
    }

    #[test]
    fn cascade_on_missing_account_is_not_found() {
        let storage = Storage::temporary().unwrap();
        assert!(matches!(
            storage.delete_account_cascade("ghost"),
            Err(StorageError::Missing("account"))
        ));
    }

    #[test]
    fn post_requires_existing_author() {
        let storage = Storage::temporary().unwrap();
        let ghost = account("g1", "ghost", "g@x.com");
        assert!(matches!(
            storage.create_post(&post("p1", &ghost)),
            Err(StorageError::Missing("account"))
        ));
    }

    #[test]
    fn toggle_like_is_involutive() {
        let storage = Storage::temporary().unwrap();
        let ana = account("a1", "ana", "a@x.com");
        storage.create_account(&ana).unwrap();
        storage.create_account(&account("b1", "bob", "b@x.com")).unwrap();
        storage.create_account(&account("c1", "cid", "c@x.com")).unwrap();
        storage.create_post(&post("p1", &ana)).unwrap();

        let first = storage.toggle_like("p1", "b1").unwrap();
        assert_eq!(first, LikeStatus { liked: true, likes: 1 });
        let other = storage.toggle_like("p1", "c1").unwrap();
        assert_eq!(other.likes, 2);
        let second = storage.toggle_like("p1", "b1").unwrap();
        assert_eq!(second, LikeStatus { liked: false, likes: 1 });

        let likes = storage.get_post("p1").unwrap().unwrap().likes;
        assert_eq!(likes.into_iter().collect::<Vec<_>>(), vec!["c1".to_string()]);
        assert!(matches!(
            storage.toggle_like("nope", "b1"),
            Err(StorageError::Missing("post"))
        ));
    }

    #[test]
    fn posts_listed_newest_first_with_authors() {
        let storage = Storage::temporary().unwrap();
        let ana = account("a1", "ana", "a@x.com");
        storage.create_account(&ana).unwrap();
        let mut older = post("p1", &ana);
        older.created_at = Utc::now() - Duration::hours(1);
        storage.create_post(&older).unwrap();
        storage.create_post(&post("p2", &ana)).unwrap();

        let views = storage.populate_posts(storage.list_posts().unwrap()).unwrap();
        assert_eq!(views[0].post.id, "p2");
        assert_eq!(views[1].post.id, "p1");
        assert_eq!(views[0].author.as_ref().map(|a| a.username.as_str()), Some("ana"));
    }

    #[test]
    fn deleting_post_removes_its_comments() {
        let storage = Storage::temporary().unwrap();
        let ana = account("a1", "ana", "a@x.com");
        storage.create_account(&ana).unwrap();
        storage.create_post(&post("p1", &ana)).unwrap();
        storage.create_comment(&comment("c1", "p1", &ana)).unwrap();
        storage.create_comment(&comment("c2", "p1", &ana)).unwrap();

        assert_eq!(storage.comments_for_post("p1").unwrap().len(), 2);
        assert_eq!(storage.delete_post("p1").unwrap(), 2);
        assert!(storage.comments_for_post("p1").unwrap().is_empty());
        assert!(matches!(storage.delete_post("p1"), Err(StorageError::Missing("post"))));
    }

    #[test]
    fn comment_on_missing_post_rejected() {
        let storage = Storage::temporary().unwrap();
        let ana = account("a1", "ana", "a@x.com");
        storage.create_account(&ana).unwrap();
        assert!(matches!(
            storage.create_comment(&comment("c1", "nope", &ana)),
            Err(StorageError::Missing("post"))
        ));
        assert!(matches!(storage.delete_comment("c1"), Err(StorageError::Missing("comment"))));
    }

    #[test]
    fn ownership_indexes_follow_deletes() {
        let storage = Storage::temporary().unwrap();
        let ana = account("a1", "ana", "a@x.com");
        storage.create_account(&ana).unwrap();
        storage.create_post(&post("p1", &ana)).unwrap();
        storage.create_post(&post("p2", &ana)).unwrap();
        storage.create_comment(&comment("c1", "p2", &ana)).unwrap();
        storage.create_comment(&comment("c2", "p2", &ana)).unwrap();

        storage.delete_comment("c1").unwrap();
        let left: Vec<String> = storage.comments_for_post("p2").unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(left, vec!["c2".to_string()]);

        storage.delete_post("p1").unwrap();
        let report = storage.delete_account_cascade("a1").unwrap();
        assert_eq!(report, CascadeReport { posts: 1, comments: 1 });
        assert!(storage.list_posts().unwrap().is_empty());
        assert_eq!(storage.get_comment("c2").unwrap(), None);
    }

    #[test]
    fn update_account_reindexes_from_stored_record() {
        let storage = Storage::temporary().unwrap();
        let ana = account("a1", "ana", "x@x.com");
        storage.create_account(&ana).unwrap();

        // Two edits both derived from the same snapshot.
        let mut to_y = ana.clone();
        to_y.email = "y@x.com".to_string();
        let mut to_z = ana.clone();
        to_z.email = "z@x.com".to_string();
        storage.update_account(&to_y).unwrap();
        storage.update_account(&to_z).unwrap();

        assert_eq!(storage.find_account_by_email("y@x.com").unwrap(), None);
        assert_eq!(storage.find_account_by_email("x@x.com").unwrap(), None);
        assert_eq!(
            storage.find_account_by_email("z@x.com").unwrap().map(|a| a.id),
            Some("a1".to_string())
        );
        // The intermediate address is free again.
        storage.create_account(&account("b1", "bob", "y@x.com")).unwrap();
    }

    #[test]
    fn deleted_account_cannot_like_or_comment() {
        let storage = Storage::temporary().unwrap();
        let ana = account("a1", "ana", "a@x.com");
        let bob = account("b1", "bob", "b@x.com");
        storage.create_account(&ana).unwrap();
        storage.create_account(&bob).unwrap();
        storage.create_post(&post("p1", &ana)).unwrap();
        storage.delete_account_cascade("b1").unwrap();

        assert!(matches!(
            storage.toggle_like("p1", "b1"),
            Err(StorageError::Missing("account"))
        ));
        assert!(matches!(
            storage.create_comment(&comment("c1", "p1", &bob)),
            Err(StorageError::Missing("account"))
        ));
        let post = storage.get_post("p1").unwrap().unwrap();
        assert!(post.likes.is_empty());
        assert!(storage.comments_for_post("p1").unwrap().is_empty());
    }
}
