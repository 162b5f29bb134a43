//! Read-time entry shaping shared by the feed and single-entry
//! endpoints: author picture refresh, comment/like collapsing and the
//! per-viewer command lists.

use feedvault_store::{get_profile_by_id, RepoError, RepoResult, Store};
use feedvault_wire::{Comment, Entry, Feed, Feedinfo, Graph, Like, Profile};

/// Collapsing threshold: threads longer than this are folded when the
/// caller did not ask for full ones.
const COLLAPSE_OVER: usize = 4;

pub fn build_graph(info: &Feedinfo) -> Graph {
    let mut graph = Graph::default();
    for item in &info.subscriptions {
        graph.subscriptions.insert(item.id.clone(), item.clone());
    }
    for item in &info.admins {
        graph.admins.insert(item.id.clone(), item.clone());
    }
    for item in &info.services {
        graph.services.insert(item.id.clone(), item.clone());
    }
    graph
}

/// The lightweight author reference stored inside entries, comments
/// and likes.
pub fn feed_lite(profile: &Profile) -> Feed {
    Feed {
        uuid: profile.uuid.clone(),
        id: profile.id.clone(),
        name: profile.name.clone(),
        picture: profile.picture.clone(),
        kind: profile.kind.clone(),
        private: profile.private,
        sup_id: profile.sup_id.clone(),
        description: profile.description.clone(),
        entries: Vec::new(),
    }
}

/// Rewrite one entry for a caller.
///
/// `viewer` is the logged-in profile when there is one; `graph` is the
/// viewed feed's adjacency.
pub fn format_entry(
    mdb: &Store,
    max_comments: i32,
    max_likes: i32,
    viewer: Option<&Profile>,
    graph: &Graph,
    entry: &mut Entry,
) -> RepoResult<()> {
    refresh_author_picture(mdb, entry)?;
    collapse_comments(entry, max_comments);
    collapse_likes(entry, max_likes);
    rebuild_entry_commands(entry, viewer, graph);
    rebuild_comment_commands(entry, viewer);
    Ok(())
}

/// The stored `from.picture` goes stale when a profile refreshes;
/// always serve the current one. Authors whose profile was never
/// archived keep whatever the entry carries.
fn refresh_author_picture(mdb: &Store, entry: &mut Entry) -> RepoResult<()> {
    let Some(from) = entry.from.as_mut() else {
        return Ok(());
    };
    match get_profile_by_id(mdb, &from.id) {
        Ok(profile) => {
            from.picture = profile.picture;
            Ok(())
        }
        Err(RepoError::NotFound) => Ok(()),
        Err(err) => Err(err),
    }
}

fn collapse_comments(entry: &mut Entry, max_comments: i32) {
    let length = entry.comments.len();
    if max_comments != 0 || length <= COLLAPSE_OVER {
        return;
    }
    let hidden = (length - 2) as i32;
    let collapsing = Comment {
        body: format!("{hidden} more comments"),
        num: hidden,
        placeholder: true,
        ..Default::default()
    };
    let first = entry.comments.first().cloned().expect("Non-empty");
    let last = entry.comments.last().cloned().expect("Non-empty");
    entry.comments = vec![first, collapsing, last];
}

fn collapse_likes(entry: &mut Entry, max_likes: i32) {
    let length = entry.likes.len();
    if max_likes != 0 || length <= COLLAPSE_OVER {
        return;
    }
    let hidden = (length - 2) as i32;
    let collapsing = Like {
        body: format!("{hidden} other people"),
        num: hidden,
        placeholder: true,
        ..Default::default()
    };
    entry.likes.truncate(3);
    entry.likes.push(collapsing);
}

/// Actions the viewer may take on the entry. Anonymous viewers get an
/// empty list.
fn rebuild_entry_commands(entry: &mut Entry, viewer: Option<&Profile>, graph: &Graph) {
    let Some(viewer) = viewer.filter(|v| !v.id.is_empty()) else {
        entry.commands = Vec::new();
        return;
    };

    let author = entry
        .from
        .as_ref()
        .map(|from| from.id.clone())
        .unwrap_or_default();

    let mut commands = vec!["comment".to_owned()];
    if graph.admins.contains_key(&viewer.id) || viewer.id == author {
        commands.push("edit".to_owned());
        commands.push("delete".to_owned());
    } else {
        let liked = entry.likes.iter().any(|like| {
            like.from
                .as_ref()
                .is_some_and(|from| from.id == viewer.id)
        });
        commands.push(if liked { "unlike" } else { "like" }.to_owned());
    }
    entry.commands = commands;
}

fn rebuild_comment_commands(entry: &mut Entry, viewer: Option<&Profile>) {
    for comment in &mut entry.comments {
        comment.commands = Vec::new();
        let (Some(viewer), Some(from)) = (viewer, comment.from.as_ref()) else {
            continue;
        };
        if !viewer.id.is_empty() && viewer.id == from.id {
            comment.commands = vec!["edit".to_owned(), "delete".to_owned()];
        }
    }
}
