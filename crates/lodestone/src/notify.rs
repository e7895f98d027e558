//! Domain notifications and diagnostics.
//!
//! The translator emits exactly one [`Notification`] per recognized event
//! (one per RSVP for bulk RSVP updates). Records are carried as snapshots;
//! update variants also carry the snapshot taken before the merge when the
//! record was already cached.

use serde::Serialize;

use crate::CacheError;
use crate::entity::EntityKind;
use crate::events::{Emote, PermissionOverride};
use crate::models::{
    Announcement, AnnouncementComment, BannedMember, CalendarComment, CalendarEvent,
    CalendarRsvp, Channel, ForumThread, ForumThreadComment, Group, Guild, Member, Message,
    Webhook,
};
use crate::resolver::{MessageStub, Resolved, ThreadStub};

/// A change to the cache, derived from one gateway event.
#[derive(Debug, Clone)]
pub enum Notification {
    GuildCreate { guild: Guild, created_by: Option<String> },
    GuildDelete { guild: Guild, deleted_by: Option<String> },

    ChannelCreate { channel: Channel },
    ChannelUpdate { channel: Channel, previous: Option<Channel> },
    ChannelDelete { channel: Channel },
    ChannelArchive { channel: Channel },
    ChannelRestore { channel: Channel },

    PermissionCreate(PermissionOverride),
    PermissionUpdate(PermissionOverride),
    PermissionDelete(PermissionOverride),

    MessageCreate { message: Message },
    MessageUpdate { message: Message, previous: Option<Message> },
    MessageDelete { message: Message },

    ThreadCreate { thread: ForumThread },
    ThreadUpdate { thread: ForumThread, previous: Option<ForumThread> },
    ThreadDelete { thread: ForumThread },
    ThreadPin { thread: ForumThread },
    ThreadUnpin { thread: ForumThread },
    ThreadLock { thread: ForumThread },
    ThreadUnlock { thread: ForumThread },

    ThreadCommentCreate { comment: ForumThreadComment },
    ThreadCommentUpdate { comment: ForumThreadComment, previous: Option<ForumThreadComment> },
    ThreadCommentDelete { comment: ForumThreadComment },

    AnnouncementCreate { announcement: Announcement },
    AnnouncementUpdate { announcement: Announcement, previous: Option<Announcement> },
    AnnouncementDelete { announcement: Announcement },

    AnnouncementCommentCreate { comment: AnnouncementComment },
    AnnouncementCommentUpdate {
        comment: AnnouncementComment,
        previous: Option<AnnouncementComment>,
    },
    AnnouncementCommentDelete { comment: AnnouncementComment },

    CalendarEventCreate { event: CalendarEvent },
    CalendarEventUpdate { event: CalendarEvent, previous: Option<CalendarEvent> },
    CalendarEventDelete { event: CalendarEvent },

    CalendarCommentCreate { comment: CalendarComment },
    CalendarCommentUpdate { comment: CalendarComment, previous: Option<CalendarComment> },
    CalendarCommentDelete { comment: CalendarComment },

    RsvpUpdate { rsvp: CalendarRsvp, previous: Option<CalendarRsvp> },
    RsvpDelete { rsvp: CalendarRsvp },

    ReactionAdd(Reaction),
    ReactionRemove(Reaction),

    MemberJoin { member: Member },
    MemberUpdate { member: Member, previous: Option<Member> },
    MemberRemove {
        guild_id: String,
        user_id: String,
        /// Last cached state, if the member was cached.
        member: Option<Member>,
        is_kick: bool,
        is_ban: bool,
    },
    MemberBan { ban: BannedMember },
    MemberUnban { ban: BannedMember },

    WebhookCreate { webhook: Webhook },
    WebhookUpdate { webhook: Webhook, previous: Option<Webhook> },

    GroupCreate { group: Group },
    GroupUpdate { group: Group, previous: Option<Group> },
    GroupDelete { group: Group },
}

impl Notification {
    /// Event-style name, e.g. `channelCreate`.
    pub fn name(&self) -> &'static str {
        match self {
            Notification::GuildCreate { .. } => "guildCreate",
            Notification::GuildDelete { .. } => "guildDelete",
            Notification::ChannelCreate { .. } => "channelCreate",
            Notification::ChannelUpdate { .. } => "channelUpdate",
            Notification::ChannelDelete { .. } => "channelDelete",
            Notification::ChannelArchive { .. } => "channelArchive",
            Notification::ChannelRestore { .. } => "channelRestore",
            Notification::PermissionCreate(_) => "permissionCreate",
            Notification::PermissionUpdate(_) => "permissionUpdate",
            Notification::PermissionDelete(_) => "permissionDelete",
            Notification::MessageCreate { .. } => "messageCreate",
            Notification::MessageUpdate { .. } => "messageUpdate",
            Notification::MessageDelete { .. } => "messageDelete",
            Notification::ThreadCreate { .. } => "forumThreadCreate",
            Notification::ThreadUpdate { .. } => "forumThreadUpdate",
            Notification::ThreadDelete { .. } => "forumThreadDelete",
            Notification::ThreadPin { .. } => "forumThreadPin",
            Notification::ThreadUnpin { .. } => "forumThreadUnpin",
            Notification::ThreadLock { .. } => "forumThreadLock",
            Notification::ThreadUnlock { .. } => "forumThreadUnlock",
            Notification::ThreadCommentCreate { .. } => "forumCommentCreate",
            Notification::ThreadCommentUpdate { .. } => "forumCommentUpdate",
            Notification::ThreadCommentDelete { .. } => "forumCommentDelete",
            Notification::AnnouncementCreate { .. } => "announcementCreate",
            Notification::AnnouncementUpdate { .. } => "announcementUpdate",
            Notification::AnnouncementDelete { .. } => "announcementDelete",
            Notification::AnnouncementCommentCreate { .. } => "announcementCommentCreate",
            Notification::AnnouncementCommentUpdate { .. } => "announcementCommentUpdate",
            Notification::AnnouncementCommentDelete { .. } => "announcementCommentDelete",
            Notification::CalendarEventCreate { .. } => "calendarEventCreate",
            Notification::CalendarEventUpdate { .. } => "calendarEventUpdate",
            Notification::CalendarEventDelete { .. } => "calendarEventDelete",
            Notification::CalendarCommentCreate { .. } => "calendarCommentCreate",
            Notification::CalendarCommentUpdate { .. } => "calendarCommentUpdate",
            Notification::CalendarCommentDelete { .. } => "calendarCommentDelete",
            Notification::RsvpUpdate { .. } => "calendarRsvpUpdate",
            Notification::RsvpDelete { .. } => "calendarRsvpDelete",
            Notification::ReactionAdd(_) => "reactionAdd",
            Notification::ReactionRemove(_) => "reactionRemove",
            Notification::MemberJoin { .. } => "guildMemberAdd",
            Notification::MemberUpdate { .. } => "guildMemberUpdate",
            Notification::MemberRemove { .. } => "guildMemberRemove",
            Notification::MemberBan { .. } => "guildBanAdd",
            Notification::MemberUnban { .. } => "guildBanRemove",
            Notification::WebhookCreate { .. } => "webhookCreate",
            Notification::WebhookUpdate { .. } => "webhookUpdate",
            Notification::GroupCreate { .. } => "groupCreate",
            Notification::GroupUpdate { .. } => "groupUpdate",
            Notification::GroupDelete { .. } => "groupDelete",
        }
    }
}

/// A reaction added to or removed from some content.
#[derive(Debug, Clone)]
pub struct Reaction {
    pub guild_id: String,
    pub channel_id: String,
    pub created_by: String,
    pub emote: Emote,
    pub target: ReactionTarget,
}

/// What a reaction was placed on.
#[derive(Debug, Clone)]
pub enum ReactionTarget {
    Message(Resolved<Message, MessageStub>),
    Thread(Resolved<ForumThread, ThreadStub>),
    ThreadComment {
        thread: Resolved<ForumThread, ThreadStub>,
        comment_id: u64,
    },
}

/// Non-fatal problems met while processing the event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A side-effect registration did not complete. The event's
    /// notification was still emitted.
    RegistrationFailed {
        kind: EntityKind,
        id: String,
        reason: String,
    },
    /// An event was dropped because its payload could not be applied.
    MalformedEvent { event: String, reason: String },
}

impl Diagnostic {
    /// Diagnostic for an error met while handling `event`.
    pub(crate) fn from_error(event: &str, err: &CacheError) -> Self {
        match err {
            CacheError::RegistrationFailed { kind, id, reason } => Diagnostic::RegistrationFailed {
                kind: *kind,
                id: id.clone(),
                reason: reason.clone(),
            },
            CacheError::MalformedEvent { reason, .. } => Diagnostic::MalformedEvent {
                event: event.to_string(),
                reason: reason.clone(),
            },
            other => Diagnostic::MalformedEvent {
                event: event.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::RegistrationFailed { kind, id, reason } => {
                write!(f, "cannot register {} {} to cache: {}", kind, id, reason)
            }
            Diagnostic::MalformedEvent { event, reason } => {
                write!(f, "dropped malformed {} event: {}", event, reason)
            }
        }
    }
}
