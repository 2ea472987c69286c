//! SeaORM entity models
//!
//! Database entities for Inkwell

mod blog;
mod user;

pub use user::{
    Entity as UserEntity,
    Model as User,
    ActiveModel as UserActiveModel,
    Column as UserColumn,
    Relation as UserRelation,
};

pub use blog::{
    Entity as BlogEntity,
    Model as Blog,
    ActiveModel as BlogActiveModel,
    Column as BlogColumn,
    Relation as BlogRelation,
};
