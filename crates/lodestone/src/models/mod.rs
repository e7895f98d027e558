//! Cached entity kinds and their wire payloads.

mod announcement;
mod calendar;
mod channel;
mod forum;
mod group;
mod guild;
mod member;
mod message;
mod webhook;

pub use announcement::{
    Announcement, AnnouncementChildren, AnnouncementComment, RawAnnouncement,
    RawAnnouncementComment,
};
pub use calendar::{
    CalendarComment, CalendarEvent, CalendarEventChildren, CalendarRsvp, Cancellation,
    RawCalendarComment, RawCalendarEvent, RawCalendarRsvp, RsvpKey, RsvpStatus,
};
pub use channel::{Channel, ChannelChildren, ChannelType, ChannelVisibility, RawChannel};
pub use forum::{
    ForumThread, ForumThreadChildren, ForumThreadComment, RawForumThread, RawForumThreadComment,
};
pub use group::{Group, RawGroup};
pub use guild::{Guild, GuildChildren, RawGuild};
pub use member::{BannedMember, Member, RawBannedMember, RawMember, RawUser, User, UserKind};
pub use message::{Message, MessageType, RawMessage};
pub use webhook::{RawWebhook, Webhook};
