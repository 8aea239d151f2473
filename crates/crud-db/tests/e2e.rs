use std::sync::Arc;

use crud_db::{
    args, fields, impl_record, qualify, Criteria, Database, DbError, Graph, GraphReport, Options,
    Resolver, SqliteDriver, Upsert, Value,
};

const SCHEMA: &str = "
CREATE TABLE user (
    id INTEGER PRIMARY KEY,
    name VARCHAR(64) NOT NULL,
    is_deleted INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE `order` (id INTEGER PRIMARY KEY, user_id INTEGER, status TEXT);
CREATE TABLE post (id INTEGER PRIMARY KEY, title TEXT);
CREATE TABLE tag (id INTEGER PRIMARY KEY, name TEXT);
CREATE TABLE post_tag (post_id INTEGER, tag_id INTEGER);

INSERT INTO user (id, name) VALUES (7, 'ada'), (8, 'bob');
INSERT INTO user (id, name, is_deleted) VALUES (9, 'eve', 1);
INSERT INTO `order` (id, user_id, status) VALUES (1, 7, 'paid'), (2, 7, 'new'), (3, 9, 'new'), (4, NULL, 'lost');
INSERT INTO post (id, title) VALUES (3, 'hello'), (4, 'bye');
INSERT INTO tag (id, name) VALUES (1, 'rust'), (2, 'sql'), (3, 'misc');
INSERT INTO post_tag (post_id, tag_id) VALUES (3, 1), (3, 2), (4, 3);
";

fn open(options: Options) -> Database {
    let driver = SqliteDriver::open_in_memory().unwrap();
    driver.execute_batch(SCHEMA).unwrap();
    Database::new(Arc::new(driver), options).unwrap()
}

fn db() -> Database {
    open(Options::default())
}

#[derive(Debug, Default)]
struct User {
    id: i64,
    name: String,
    orders: Vec<Order>,
}

impl_record! {
    User { id, name }
    relations { orders }
}

#[derive(Debug, Default)]
struct Order {
    id: i64,
    user_id: Option<i64>,
    status: String,
    user: Option<User>,
}

impl_record! {
    Order { id, user_id, status }
    relations { user }
}

#[derive(Debug, Default)]
struct Post {
    id: i64,
    title: String,
    tags: Vec<Tag>,
}

impl_record! {
    Post { id, title }
    relations { tags }
}

#[derive(Debug, Default)]
struct Tag {
    id: i64,
    name: String,
}

impl_record! {
    Tag { id, name }
}

#[test]
fn resolves_order_to_user() {
    let db = db();
    let order = db.find_one::<Order>(Criteria::id(1)).unwrap().unwrap();

    let relationship = Resolver::new(db.catalog(), "is_deleted")
        .resolve_record(&order, "user")
        .unwrap();
    assert_eq!(
        relationship.sql,
        "SELECT `user`.* FROM `user` WHERE `user`.`id` = ? AND `user`.`is_deleted` = 0"
    );
    assert_eq!(relationship.arg, Value::Integer(7));

    let rows = db
        .query(&relationship.sql, &[relationship.arg])
        .unwrap()
        .row_maps();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "ada");
}

#[test]
fn resolves_post_to_tags_through_junction() {
    let db = db();
    let post = db.find_one::<Post>(Criteria::id(3)).unwrap().unwrap();

    let relationship = Resolver::new(db.catalog(), "is_deleted")
        .resolve_record(&post, "tag")
        .unwrap();
    assert_eq!(
        relationship.sql,
        "SELECT `tag`.* FROM `tag` INNER JOIN `post_tag` ON `post_tag`.`tag_id` = `tag`.`id` \
         WHERE `post_tag`.`post_id` = ?"
    );
    assert_eq!(relationship.arg, Value::Integer(3));

    let mut names: Vec<String> = db
        .query(&relationship.sql, &[relationship.arg])
        .unwrap()
        .row_maps()
        .into_iter()
        .map(|row| row["name"].clone())
        .collect();
    names.sort();
    assert_eq!(names, ["rust", "sql"]);
}

#[test]
fn find_all_loads_junction_relations() {
    let (posts, report) = db().find_all::<Post>(Criteria::All).unwrap();

    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].tags.len(), 2);
    assert_eq!(posts[1].tags.len(), 1);
    assert_eq!(posts[1].tags[0].name, "misc");
    assert_eq!(report.expanded, 2);
    assert_eq!(report.truncated, 0);
}

#[test]
fn find_all_breaks_cycles() {
    let (orders, report) = db()
        .find_all::<Order>(Criteria::Where("`order`.`id` = ?".into(), args![1]))
        .unwrap();

    let order = &orders[0];
    let user = order.user.as_ref().unwrap();
    assert_eq!(user.name, "ada");
    assert_eq!(
        user.orders.iter().map(|o| o.id).collect::<Vec<_>>(),
        [1, 2]
    );
    // order 1 is already being expanded
    assert!(user.orders[0].user.is_none());
    // order 2 loads user 7 again, but not its orders
    let again = user.orders[1].user.as_ref().unwrap();
    assert_eq!(again.id, 7);
    assert!(again.orders.is_empty());
    assert_eq!(report.expanded, 3);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.truncated, 0);
}

#[test]
fn find_all_respects_depth_limit() {
    let db = open(Options {
        max_relation_depth: 1,
        ..Options::default()
    });

    let (orders, report) = db.find_all::<Order>(Criteria::id(2)).unwrap();

    let user = orders[0].user.as_ref().unwrap();
    assert_eq!(user.id, 7);
    assert!(user.orders.is_empty());
    assert_eq!(report.expanded, 1);
    assert_eq!(report.truncated, 1);
}

#[test]
fn graph_depth_overrides_configuration() {
    let db = db();
    let mut order = db.find_one::<Order>(Criteria::id(2)).unwrap().unwrap();

    let mut graph = Graph::new(&db).max_depth(1);
    graph.populate(&mut order).unwrap();

    let user = order.user.as_ref().unwrap();
    assert!(user.orders.is_empty());
    assert_eq!(
        graph.report(),
        GraphReport {
            expanded: 1,
            skipped: 0,
            truncated: 1,
        }
    );
}

#[test]
fn populate_sums_reports_of_every_record() {
    let db = db();
    let mut posts = db.find::<Post>(Criteria::All).unwrap();
    let total = db.populate(&mut posts).unwrap();

    let mut expected = GraphReport::default();
    for id in [3, 4] {
        let mut post = db.find_one::<Post>(Criteria::id(id)).unwrap().unwrap();
        let mut graph = Graph::new(&db);
        graph.populate(&mut post).unwrap();
        expected.merge(graph.report());
    }

    assert_eq!(total, expected);
    assert_eq!(total.expanded, 2);
}

#[test]
fn find_all_skips_missing_and_deleted_targets() {
    let (orders, report) = db()
        .find_all::<Order>(Criteria::parse("status = ?", args!["new"]))
        .unwrap();
    let lost = db().find_all::<Order>(Criteria::id(4)).unwrap();

    // order 3 belongs to a deleted user
    let third = orders.iter().find(|o| o.id == 3).unwrap();
    assert!(third.user.is_none());
    assert!(report.expanded >= 2);

    // order 4 has no user at all
    assert!(lost.0[0].user.is_none());
    assert_eq!(lost.1.skipped, 1);
}

#[test]
fn find_accepts_every_criteria() {
    let db = db();

    assert_eq!(db.find::<User>(Criteria::All).unwrap().len(), 2);
    assert_eq!(db.find::<User>(Criteria::id(8)).unwrap()[0].name, "bob");
    assert!(db.find::<User>(Criteria::id(9)).unwrap().is_empty());
    assert_eq!(
        db.find::<User>(Criteria::parse("name LIKE ?", args!["a%"]))
            .unwrap()
            .len(),
        1
    );

    let raw = db
        .find::<User>(Criteria::parse(
            "SELECT id, name FROM user WHERE is_deleted = ?",
            args![1],
        ))
        .unwrap();
    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0].name, "eve");
}

#[test]
fn qualified_fields_are_stable() {
    let db = db();
    for field in ["`user`.`name`", "`order`.*", "`user`.`id` AS uid"] {
        let once = qualify(field, "order", db.catalog()).text;
        let twice = qualify(&once, "order", db.catalog()).text;
        assert_eq!(once, field);
        assert_eq!(twice, once);
    }
}

#[test]
fn empty_in_keeps_the_statement() {
    let db = db();
    let base = db.search("order").filter("status = ?", args!["new"]);

    assert_eq!(base.clone().in_("id", args![]).build(), base.build());
    assert_eq!(base.clone().not_in("id", args![]).build(), base.build());
}

#[test]
fn soft_delete_predicate_appears_once() {
    let db = db();
    let search = db.search("user").fields(["id", "name"]);

    for (sql, _) in [search.build(), search.clone().build(), search.clone().limit(1).build()] {
        assert_eq!(sql.matches("`user`.`is_deleted` = ?").count(), 1);
    }
    assert_eq!(search.row_maps().unwrap().len(), 2);
}

#[test]
fn clones_do_not_share_fragments() {
    let db = db();
    let base = db.search("order").filter("status = ?", args!["new"]);
    let before = base.build();

    let branch = base.clone().filter("user_id = ?", args![7]);

    assert_eq!(base.build(), before);
    assert_eq!(base.count().unwrap(), 2);
    assert_eq!(branch.count().unwrap(), 1);
}

#[test]
fn create_update_read_round_trip() {
    let db = db();
    let posts = db.table("post");

    let id = posts.create(fields! { "title" => "a" }, &[]).unwrap();
    posts.update(fields! { "id" => id, "title" => "b" }, &[]).unwrap();

    let row = posts.read(fields! { "id" => id }).unwrap().unwrap();
    assert_eq!(row["title"], "b");
}

#[test]
fn duplicate_guard_blocks_second_insert() {
    let db = db();
    let tags = db.table("tag");

    assert!(tags.create(fields! { "name" => "new" }, &["name"]).is_ok());
    let err = tags
        .create(fields! { "name" => "new" }, &["name"])
        .unwrap_err();

    assert!(matches!(err, DbError::DuplicateInsert { .. }));
    assert_eq!(tags.reads(fields! { "name" => "new" }).unwrap().len(), 1);
    assert_eq!(
        tags.create_or_update(fields! { "name" => "new" }, &["name"])
            .unwrap(),
        Upsert::Unchanged
    );
}
