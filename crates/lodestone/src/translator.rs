//! Gateway event translator.
//!
//! Consumes the ordered event stream and, for each event: decodes the
//! payload, locates (or stubs) the owning guild and channel, applies the
//! change through the owning [`Collection`], and emits one notification.
//!
//! Events are handled one at a time under their guild's scope lock. A
//! channel seen for a guild that is not cached yet is registered by
//! fetching the guild; depending on `wait_for_caching` that registration
//! finishes before the notification goes out, or runs on a background task
//! that keeps holding the scope lock until its insert is done.

use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{OwnedMutexGuard, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, trace, warn};

use crate::CacheError;
use crate::cache::GatewayCache;
use crate::collection::Collection;
use crate::entity::{Entity, EntityKind, Scope, require};
use crate::events::{
    AnnouncementCommentPayload, AnnouncementPayload, CalendarCommentPayload,
    CalendarEventPayload, ChannelPayload, ForumTopicCommentPayload, ForumTopicPayload,
    GatewayEvent, GroupPayload, GuildMembershipPayload, MemberBanPayload, MemberJoinedPayload,
    MemberRemovedPayload, MemberUpdatedPayload, MessagePayload, PermissionOverride,
    PermissionTarget, RawPermissionOverride, ReactionPayload, RsvpManyPayload, RsvpPayload,
    WebhookPayload,
};
use crate::field::Field;
use crate::models::{CalendarRsvp, Channel, Member, RawCalendarRsvp, RawChannel};
use crate::notify::{Diagnostic, Notification, Reaction, ReactionTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelChange {
    Create,
    Update,
    Archive,
    Restore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThreadChange {
    Pin,
    Unpin,
    Lock,
    Unlock,
}

/// Outcome of applying one record change.
enum Changed<E> {
    Created(E),
    Updated(E, Option<E>),
    Deleted(E),
}

/// Apply a change to `store`, or to a detached record when the parent store
/// is not cached.
fn apply<E: Entity>(
    store: Option<&Collection<E>>,
    raw: E::Raw,
    scope: &Scope,
    change: Change,
) -> Result<Changed<E>, CacheError> {
    match change {
        Change::Delete => {
            let removed = store.and_then(|s| E::raw_key(&raw, scope).and_then(|k| s.remove(&k)));
            let last = match removed {
                Some(entity) => {
                    entity.merge(raw);
                    entity.snapshot()
                }
                None => E::construct(raw, scope)?,
            };
            Ok(Changed::Deleted(last))
        }
        Change::Create | Change::Update => {
            let (entity, previous) = match store {
                Some(store) => {
                    let upserted = store.upsert(raw, scope)?;
                    (upserted.entity.snapshot(), upserted.previous)
                }
                None => (E::construct(raw, scope)?, None),
            };
            if change == Change::Create {
                Ok(Changed::Created(entity))
            } else {
                Ok(Changed::Updated(entity, previous))
            }
        }
    }
}

fn decode<T: DeserializeOwned>(kind: &str, data: Value) -> Result<T, CacheError> {
    serde_json::from_value(data).map_err(|e| CacheError::malformed(kind, e.to_string()))
}

/// Split a permission event name into its target and change.
fn permission_event(kind: &str) -> Option<(PermissionTarget, Change)> {
    const PREFIXES: [(&str, PermissionTarget); 4] = [
        ("ChannelRolePermission", PermissionTarget::ChannelRole),
        ("ChannelUserPermission", PermissionTarget::ChannelUser),
        ("ChannelCategoryRolePermission", PermissionTarget::CategoryRole),
        ("ChannelCategoryUserPermission", PermissionTarget::CategoryUser),
    ];
    PREFIXES.iter().find_map(|(prefix, target)| {
        let change = match kind.strip_prefix(prefix)? {
            "Created" => Change::Create,
            "Updated" => Change::Update,
            "Deleted" => Change::Delete,
            _ => return None,
        };
        Some((*target, change))
    })
}

/// Fetch the guild of a newly seen channel and cache both.
///
/// A guild that got cached in the meantime is kept as is.
async fn register_channel(
    cache: &GatewayCache,
    guild_id: &str,
    raw: RawChannel,
) -> Result<(), CacheError> {
    let raw_guild = cache
        .fetcher()
        .get_guild(guild_id)
        .await
        .map_err(|source| CacheError::FetchFailed {
            kind: EntityKind::Guild,
            id: guild_id.to_string(),
            source,
        })?;
    let guild = cache.guilds().get_or_insert(raw_guild, &Scope::default())?;
    guild.channels().upsert(raw, &Scope::guild(guild_id))?;
    debug!(guild_id, "registered channel and guild");
    Ok(())
}

async fn register_channel_reporting(cache: Arc<GatewayCache>, guild_id: String, raw: RawChannel) {
    let channel_id = raw.id.cloned().unwrap_or_default();
    if let Err(e) = register_channel(&cache, &guild_id, raw).await {
        let err = CacheError::RegistrationFailed {
            kind: EntityKind::Channel,
            id: channel_id,
            reason: e.to_string(),
        };
        warn!(guild_id = %guild_id, error = %err, "cannot register channel to cache");
        cache.diagnose(Diagnostic::from_error("ServerChannelCreated", &err));
    }
}

/// Applies gateway events to a [`GatewayCache`].
pub struct EventTranslator {
    cache: Arc<GatewayCache>,
    wait_for_caching: bool,
    registrations: JoinSet<()>,
}

impl EventTranslator {
    /// Create a translator using the cache's configured ordering policy.
    pub fn new(cache: Arc<GatewayCache>) -> Self {
        let wait_for_caching = cache.config().wait_for_caching;
        Self {
            cache,
            wait_for_caching,
            registrations: JoinSet::new(),
        }
    }

    /// Override the ordering policy for lazy registrations.
    pub fn with_wait_for_caching(mut self, wait: bool) -> Self {
        self.wait_for_caching = wait;
        self
    }

    pub fn cache(&self) -> &Arc<GatewayCache> {
        &self.cache
    }

    /// Number of background registrations still running.
    pub fn pending_registrations(&self) -> usize {
        self.registrations.len()
    }

    /// Wait for every background registration to finish.
    pub async fn flush(&mut self) {
        while let Some(result) = self.registrations.join_next().await {
            Self::reap(result);
        }
    }

    /// Abort background registrations. A registration either inserted its
    /// records or did nothing.
    pub async fn shutdown(&mut self) {
        if !self.registrations.is_empty() {
            debug!(pending = self.registrations.len(), "aborting registrations");
        }
        self.registrations.shutdown().await;
    }

    fn reap(result: Result<(), tokio::task::JoinError>) {
        if let Err(e) = result {
            if e.is_panic() {
                warn!(error = %e, "registration task panicked");
            }
        }
    }

    /// Drive the translator until the stream ends or shutdown is signalled.
    ///
    /// Stream end lets pending registrations finish; a shutdown signal (or a
    /// dropped shutdown sender) aborts them.
    pub async fn run<S>(mut self, events: S, mut shutdown_rx: watch::Receiver<bool>)
    where
        S: Stream<Item = GatewayEvent>,
    {
        futures_util::pin_mut!(events);
        info!(wait_for_caching = self.wait_for_caching, "event translator started");

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("event translator received shutdown signal");
                        self.shutdown().await;
                        return;
                    }
                }

                Some(result) = self.registrations.join_next(),
                    if !self.registrations.is_empty() =>
                {
                    Self::reap(result);
                }

                event = events.next() => match event {
                    Some(event) => {
                        // Failures are already logged and diagnosed
                        let _ = self.handle_event(event).await;
                    }
                    None => {
                        info!("event stream ended");
                        self.flush().await;
                        return;
                    }
                },
            }
        }
    }

    /// Decode a `{ "t": kind, "d": payload }` envelope and handle it.
    pub async fn handle_text(&mut self, text: &str) -> Result<(), CacheError> {
        let event: GatewayEvent = serde_json::from_str(text).map_err(|e| {
            warn!(error = %e, "undecodable gateway frame");
            self.cache.diagnose(Diagnostic::MalformedEvent {
                event: "unknown".to_string(),
                reason: e.to_string(),
            });
            CacheError::Json(e)
        })?;
        self.handle_event(event).await
    }

    /// Apply one event and emit its notification.
    ///
    /// Unknown kinds are ignored. A malformed payload drops the event,
    /// reports a diagnostic and returns the error; the cache is unchanged.
    pub async fn handle_event(&mut self, event: GatewayEvent) -> Result<(), CacheError> {
        let guild_id = event.guild_id().map(str::to_string);
        let GatewayEvent { kind, data } = event;
        let guard = match guild_id {
            Some(ref guild_id) => Some(self.cache.scope_lock(guild_id).lock_owned().await),
            None => None,
        };

        match self.dispatch(&kind, data, guard).await {
            Ok(true) => {
                trace!(kind = %kind, "translator: event applied");
                Ok(())
            }
            Ok(false) => {
                trace!(kind = %kind, "ignoring unknown gateway event");
                Ok(())
            }
            Err(e) => {
                let err = match e {
                    CacheError::MalformedEvent { reason, .. } => {
                        CacheError::malformed(&kind, reason)
                    }
                    other => other,
                };
                warn!(kind = %kind, error = %err, "dropping gateway event");
                self.cache.diagnose(Diagnostic::from_error(&kind, &err));
                Err(err)
            }
        }
    }

    /// Route an event. Returns false for unrecognized kinds.
    async fn dispatch(
        &mut self,
        kind: &str,
        data: Value,
        guard: Option<OwnedMutexGuard<()>>,
    ) -> Result<bool, CacheError> {
        match kind {
            "BotServerMembershipCreated" => self.on_guild(decode(kind, data)?, Change::Create)?,
            "BotServerMembershipDeleted" => self.on_guild(decode(kind, data)?, Change::Delete)?,

            "ServerChannelCreated" => {
                self.on_channel(decode(kind, data)?, ChannelChange::Create, guard).await?
            }
            "ServerChannelUpdated" => {
                self.on_channel(decode(kind, data)?, ChannelChange::Update, guard).await?
            }
            "ChannelArchived" => {
                self.on_channel(decode(kind, data)?, ChannelChange::Archive, guard).await?
            }
            "ChannelRestored" => {
                self.on_channel(decode(kind, data)?, ChannelChange::Restore, guard).await?
            }
            "ServerChannelDeleted" => self.on_channel_delete(decode(kind, data)?)?,

            "ChatMessageCreated" => self.on_message(decode(kind, data)?, Change::Create)?,
            "ChatMessageUpdated" => self.on_message(decode(kind, data)?, Change::Update)?,
            "ChatMessageDeleted" => self.on_message(decode(kind, data)?, Change::Delete)?,

            "ForumTopicCreated" => self.on_thread(decode(kind, data)?, Change::Create)?,
            "ForumTopicUpdated" => self.on_thread(decode(kind, data)?, Change::Update)?,
            "ForumTopicDeleted" => self.on_thread(decode(kind, data)?, Change::Delete)?,
            "ForumTopicPinned" => self.on_thread_flag(decode(kind, data)?, ThreadChange::Pin)?,
            "ForumTopicUnpinned" => self.on_thread_flag(decode(kind, data)?, ThreadChange::Unpin)?,
            "ForumTopicLocked" => self.on_thread_flag(decode(kind, data)?, ThreadChange::Lock)?,
            "ForumTopicUnlocked" => self.on_thread_flag(decode(kind, data)?, ThreadChange::Unlock)?,

            "ForumTopicCommentCreated" => {
                self.on_thread_comment(decode(kind, data)?, Change::Create)?
            }
            "ForumTopicCommentUpdated" => {
                self.on_thread_comment(decode(kind, data)?, Change::Update)?
            }
            "ForumTopicCommentDeleted" => {
                self.on_thread_comment(decode(kind, data)?, Change::Delete)?
            }

            "AnnouncementCreated" => self.on_announcement(decode(kind, data)?, Change::Create)?,
            "AnnouncementUpdated" => self.on_announcement(decode(kind, data)?, Change::Update)?,
            "AnnouncementDeleted" => self.on_announcement(decode(kind, data)?, Change::Delete)?,

            "AnnouncementCommentCreated" => {
                self.on_announcement_comment(decode(kind, data)?, Change::Create)?
            }
            "AnnouncementCommentUpdated" => {
                self.on_announcement_comment(decode(kind, data)?, Change::Update)?
            }
            "AnnouncementCommentDeleted" => {
                self.on_announcement_comment(decode(kind, data)?, Change::Delete)?
            }

            "CalendarEventCreated" => self.on_calendar_event(decode(kind, data)?, Change::Create)?,
            "CalendarEventUpdated" => self.on_calendar_event(decode(kind, data)?, Change::Update)?,
            "CalendarEventDeleted" => self.on_calendar_event(decode(kind, data)?, Change::Delete)?,

            "CalendarEventCommentCreated" => {
                self.on_calendar_comment(decode(kind, data)?, Change::Create)?
            }
            "CalendarEventCommentUpdated" => {
                self.on_calendar_comment(decode(kind, data)?, Change::Update)?
            }
            "CalendarEventCommentDeleted" => {
                self.on_calendar_comment(decode(kind, data)?, Change::Delete)?
            }

            "CalendarEventRsvpUpdated" => {
                let payload: RsvpPayload = decode(kind, data)?;
                self.on_rsvp(&payload.server_id, payload.calendar_event_rsvp, Change::Update)?
            }
            "CalendarEventRsvpManyUpdated" => self.on_rsvp_many(decode(kind, data)?)?,
            "CalendarEventRsvpDeleted" => {
                let payload: RsvpPayload = decode(kind, data)?;
                self.on_rsvp(&payload.server_id, payload.calendar_event_rsvp, Change::Delete)?
            }

            "ChannelMessageReactionCreated"
            | "ForumTopicReactionCreated"
            | "ForumTopicCommentReactionCreated" => self.on_reaction(decode(kind, data)?, true)?,
            "ChannelMessageReactionDeleted"
            | "ForumTopicReactionDeleted"
            | "ForumTopicCommentReactionDeleted" => self.on_reaction(decode(kind, data)?, false)?,

            "ServerMemberJoined" => self.on_member_joined(decode(kind, data)?)?,
            "ServerMemberUpdated" => self.on_member_updated(decode(kind, data)?)?,
            "ServerMemberRemoved" => self.on_member_removed(decode(kind, data)?),
            "ServerMemberBanned" => self.on_ban(decode(kind, data)?, Change::Create)?,
            "ServerMemberUnbanned" => self.on_ban(decode(kind, data)?, Change::Delete)?,

            "ServerWebhookCreated" => self.on_webhook(decode(kind, data)?, true)?,
            "ServerWebhookUpdated" => self.on_webhook(decode(kind, data)?, false)?,

            "GroupCreated" => self.on_group(decode(kind, data)?, Change::Create)?,
            "GroupUpdated" => self.on_group(decode(kind, data)?, Change::Update)?,
            "GroupDeleted" => self.on_group(decode(kind, data)?, Change::Delete)?,

            other => match permission_event(other) {
                Some((target, change)) => self.on_permission(other, data, target, change)?,
                None => return Ok(false),
            },
        }
        Ok(true)
    }

    fn on_guild(&self, payload: GuildMembershipPayload, change: Change) -> Result<(), CacheError> {
        let store = Some(self.cache.guilds());
        let notification = match apply(store, payload.server, &Scope::default(), change)? {
            Changed::Created(guild) | Changed::Updated(guild, _) => Notification::GuildCreate {
                guild,
                created_by: payload.created_by,
            },
            Changed::Deleted(guild) => Notification::GuildDelete {
                guild,
                deleted_by: payload.deleted_by,
            },
        };
        self.cache.notify(notification);
        Ok(())
    }

    async fn on_channel(
        &mut self,
        payload: ChannelPayload,
        change: ChannelChange,
        guard: Option<OwnedMutexGuard<()>>,
    ) -> Result<(), CacheError> {
        let guild_id = payload.server_id;
        let scope = Scope::guild(&guild_id);

        let (channel, previous) = match self.cache.get_guild(&guild_id) {
            Some(guild) => {
                let upserted = guild.channels().upsert(payload.channel, &scope)?;
                (upserted.entity.snapshot(), upserted.previous)
            }
            None => {
                let detached = Channel::construct(payload.channel.clone(), &scope)?;
                if self.wait_for_caching {
                    let cache = Arc::clone(&self.cache);
                    register_channel_reporting(cache, guild_id.clone(), payload.channel).await;
                    let channel = self
                        .cache
                        .get_channel(&guild_id, &detached.id)
                        .map(|cached| cached.snapshot())
                        .unwrap_or(detached);
                    (channel, None)
                } else {
                    let cache = Arc::clone(&self.cache);
                    let raw = payload.channel;
                    let registration_guild = guild_id.clone();
                    self.registrations.spawn(async move {
                        // Held until the insert is done so later events for
                        // this guild apply after it.
                        let _guard = guard;
                        register_channel_reporting(cache, registration_guild, raw).await;
                    });
                    (detached, None)
                }
            }
        };

        let notification = match change {
            ChannelChange::Create => Notification::ChannelCreate { channel },
            ChannelChange::Update => Notification::ChannelUpdate { channel, previous },
            ChannelChange::Archive => Notification::ChannelArchive { channel },
            ChannelChange::Restore => Notification::ChannelRestore { channel },
        };
        self.cache.notify(notification);
        Ok(())
    }

    fn on_channel_delete(&self, payload: ChannelPayload) -> Result<(), CacheError> {
        let guild = self.cache.get_guild(&payload.server_id);
        let store = guild.as_ref().map(|g| g.channels());
        if let Changed::Deleted(channel) =
            apply(store, payload.channel, &Scope::guild(&payload.server_id), Change::Delete)?
        {
            self.cache.notify(Notification::ChannelDelete { channel });
        }
        Ok(())
    }

    fn on_permission(
        &self,
        kind: &str,
        mut data: Value,
        target: PermissionTarget,
        change: Change,
    ) -> Result<(), CacheError> {
        let guild_id = data
            .get("serverId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CacheError::malformed(kind, "missing serverId"))?;
        let raw = data
            .get_mut(target.payload_key())
            .map(Value::take)
            .ok_or_else(|| {
                CacheError::malformed(kind, format!("missing {}", target.payload_key()))
            })?;
        let raw: RawPermissionOverride = decode(kind, raw)?;
        let permission = PermissionOverride::from_raw(target, guild_id, raw);

        self.cache.notify(match change {
            Change::Create => Notification::PermissionCreate(permission),
            Change::Update => Notification::PermissionUpdate(permission),
            Change::Delete => Notification::PermissionDelete(permission),
        });
        Ok(())
    }

    fn on_message(&self, payload: MessagePayload, change: Change) -> Result<(), CacheError> {
        let channel_id =
            require(payload.message.channel_id.cloned(), EntityKind::Message, "channelId")?;
        let channel = payload
            .server_id
            .as_deref()
            .and_then(|guild_id| self.cache.get_channel(guild_id, &channel_id));
        let scope = Scope {
            guild_id: payload.server_id,
            channel_id: Some(channel_id),
        };

        let store = channel.as_ref().map(|c| c.messages());
        self.cache.notify(match apply(store, payload.message, &scope, change)? {
            Changed::Created(message) => Notification::MessageCreate { message },
            Changed::Updated(message, previous) => {
                Notification::MessageUpdate { message, previous }
            }
            Changed::Deleted(message) => Notification::MessageDelete { message },
        });
        Ok(())
    }

    fn on_thread(&self, payload: ForumTopicPayload, change: Change) -> Result<(), CacheError> {
        let channel_id =
            require(payload.forum_topic.channel_id.cloned(), EntityKind::ForumThread, "channelId")?;
        let channel = self.cache.get_channel(&payload.server_id, &channel_id);
        let scope = Scope::guild(&payload.server_id).with_channel(channel_id);

        let store = channel.as_ref().map(|c| c.threads());
        self.cache.notify(match apply(store, payload.forum_topic, &scope, change)? {
            Changed::Created(thread) => Notification::ThreadCreate { thread },
            Changed::Updated(thread, previous) => Notification::ThreadUpdate { thread, previous },
            Changed::Deleted(thread) => Notification::ThreadDelete { thread },
        });
        Ok(())
    }

    fn on_thread_flag(
        &self,
        mut payload: ForumTopicPayload,
        change: ThreadChange,
    ) -> Result<(), CacheError> {
        match change {
            ThreadChange::Pin => payload.forum_topic.is_pinned = Field::Value(true),
            ThreadChange::Unpin => payload.forum_topic.is_pinned = Field::Value(false),
            ThreadChange::Lock => payload.forum_topic.is_locked = Field::Value(true),
            ThreadChange::Unlock => payload.forum_topic.is_locked = Field::Value(false),
        }
        let channel_id =
            require(payload.forum_topic.channel_id.cloned(), EntityKind::ForumThread, "channelId")?;
        let channel = self.cache.get_channel(&payload.server_id, &channel_id);
        let scope = Scope::guild(&payload.server_id).with_channel(channel_id);

        let store = channel.as_ref().map(|c| c.threads());
        let thread = match apply(store, payload.forum_topic, &scope, Change::Update)? {
            Changed::Created(thread) | Changed::Updated(thread, _) | Changed::Deleted(thread) => {
                thread
            }
        };
        self.cache.notify(match change {
            ThreadChange::Pin => Notification::ThreadPin { thread },
            ThreadChange::Unpin => Notification::ThreadUnpin { thread },
            ThreadChange::Lock => Notification::ThreadLock { thread },
            ThreadChange::Unlock => Notification::ThreadUnlock { thread },
        });
        Ok(())
    }

    fn on_thread_comment(
        &self,
        payload: ForumTopicCommentPayload,
        change: Change,
    ) -> Result<(), CacheError> {
        let raw = payload.forum_topic_comment;
        let kind = EntityKind::ForumThreadComment;
        let channel_id = require(raw.channel_id.cloned(), kind, "channelId")?;
        let thread_id = require(raw.forum_topic_id.cloned(), kind, "forumTopicId")?;
        let thread = self
            .cache
            .get_forum_thread(&payload.server_id, &channel_id, thread_id);
        let scope = Scope::guild(&payload.server_id).with_channel(channel_id);

        let store = thread.as_ref().map(|t| t.comments());
        self.cache.notify(match apply(store, raw, &scope, change)? {
            Changed::Created(comment) => Notification::ThreadCommentCreate { comment },
            Changed::Updated(comment, previous) => {
                Notification::ThreadCommentUpdate { comment, previous }
            }
            Changed::Deleted(comment) => Notification::ThreadCommentDelete { comment },
        });
        Ok(())
    }

    fn on_announcement(
        &self,
        payload: AnnouncementPayload,
        change: Change,
    ) -> Result<(), CacheError> {
        let kind = EntityKind::Announcement;
        let channel_id = require(payload.announcement.channel_id.cloned(), kind, "channelId")?;
        let channel = self.cache.get_channel(&payload.server_id, &channel_id);
        let scope = Scope::guild(&payload.server_id).with_channel(channel_id);

        let store = channel.as_ref().map(|c| c.announcements());
        self.cache.notify(match apply(store, payload.announcement, &scope, change)? {
            Changed::Created(announcement) => Notification::AnnouncementCreate { announcement },
            Changed::Updated(announcement, previous) => {
                Notification::AnnouncementUpdate { announcement, previous }
            }
            Changed::Deleted(announcement) => Notification::AnnouncementDelete { announcement },
        });
        Ok(())
    }

    fn on_announcement_comment(
        &self,
        payload: AnnouncementCommentPayload,
        change: Change,
    ) -> Result<(), CacheError> {
        let raw = payload.announcement_comment;
        let kind = EntityKind::AnnouncementComment;
        let channel_id = require(raw.channel_id.cloned(), kind, "channelId")?;
        let announcement_id = require(raw.announcement_id.cloned(), kind, "announcementId")?;
        let announcement = self
            .cache
            .get_channel(&payload.server_id, &channel_id)
            .and_then(|c| c.announcements().get(&announcement_id));
        let scope = Scope::guild(&payload.server_id).with_channel(channel_id);

        let store = announcement.as_ref().map(|a| a.comments());
        self.cache.notify(match apply(store, raw, &scope, change)? {
            Changed::Created(comment) => Notification::AnnouncementCommentCreate { comment },
            Changed::Updated(comment, previous) => {
                Notification::AnnouncementCommentUpdate { comment, previous }
            }
            Changed::Deleted(comment) => Notification::AnnouncementCommentDelete { comment },
        });
        Ok(())
    }

    fn on_calendar_event(
        &self,
        payload: CalendarEventPayload,
        change: Change,
    ) -> Result<(), CacheError> {
        let kind = EntityKind::CalendarEvent;
        let channel_id = require(payload.calendar_event.channel_id.cloned(), kind, "channelId")?;
        let channel = self.cache.get_channel(&payload.server_id, &channel_id);
        let scope = Scope::guild(&payload.server_id).with_channel(channel_id);

        let store = channel.as_ref().map(|c| c.calendar_events());
        self.cache.notify(match apply(store, payload.calendar_event, &scope, change)? {
            Changed::Created(event) => Notification::CalendarEventCreate { event },
            Changed::Updated(event, previous) => {
                Notification::CalendarEventUpdate { event, previous }
            }
            Changed::Deleted(event) => Notification::CalendarEventDelete { event },
        });
        Ok(())
    }

    fn on_calendar_comment(
        &self,
        payload: CalendarCommentPayload,
        change: Change,
    ) -> Result<(), CacheError> {
        let raw = payload.calendar_event_comment;
        let kind = EntityKind::CalendarComment;
        let channel_id = require(raw.channel_id.cloned(), kind, "channelId")?;
        let event_id = require(raw.calendar_event_id.cloned(), kind, "calendarEventId")?;
        let event = self
            .cache
            .get_channel(&payload.server_id, &channel_id)
            .and_then(|c| c.calendar_events().get(&event_id));
        let scope = Scope::guild(&payload.server_id).with_channel(channel_id);

        let store = event.as_ref().map(|e| e.comments());
        self.cache.notify(match apply(store, raw, &scope, change)? {
            Changed::Created(comment) => Notification::CalendarCommentCreate { comment },
            Changed::Updated(comment, previous) => {
                Notification::CalendarCommentUpdate { comment, previous }
            }
            Changed::Deleted(comment) => Notification::CalendarCommentDelete { comment },
        });
        Ok(())
    }

    fn on_rsvp(
        &self,
        guild_id: &str,
        raw: RawCalendarRsvp,
        change: Change,
    ) -> Result<(), CacheError> {
        let kind = EntityKind::CalendarRsvp;
        let channel_id = require(raw.channel_id.cloned(), kind, "channelId")?;
        let event_id = require(raw.calendar_event_id.cloned(), kind, "calendarEventId")?;
        let event = self
            .cache
            .get_channel(guild_id, &channel_id)
            .and_then(|c| c.calendar_events().get(&event_id));
        let scope = Scope::guild(guild_id).with_channel(channel_id);

        let store = event.as_ref().map(|e| e.rsvps());
        self.cache.notify(match apply(store, raw, &scope, change)? {
            Changed::Created(rsvp) => Notification::RsvpUpdate { rsvp, previous: None },
            Changed::Updated(rsvp, previous) => Notification::RsvpUpdate { rsvp, previous },
            Changed::Deleted(rsvp) => Notification::RsvpDelete { rsvp },
        });
        Ok(())
    }

    fn on_rsvp_many(&self, payload: RsvpManyPayload) -> Result<(), CacheError> {
        // Validate every entry first so a bad one drops the whole event
        let scope = Scope::guild(&payload.server_id);
        for raw in &payload.calendar_event_rsvps {
            if CalendarRsvp::raw_key(raw, &scope).is_none() || raw.channel_id.value().is_none() {
                return Err(CacheError::malformed(
                    EntityKind::CalendarRsvp.as_str(),
                    "entry missing calendarEventId, userId or channelId",
                ));
            }
        }
        for raw in payload.calendar_event_rsvps {
            self.on_rsvp(&payload.server_id, raw, Change::Update)?;
        }
        Ok(())
    }

    fn on_reaction(&self, payload: ReactionPayload, added: bool) -> Result<(), CacheError> {
        let guild_id = payload.server_id;
        let raw = payload.reaction;
        let channel_id = &raw.channel_id;
        let target = match (raw.message_id, raw.forum_topic_id, raw.forum_topic_comment_id) {
            (Some(message_id), _, _) => {
                let message = self.cache.resolve_message(&guild_id, channel_id, &message_id);
                ReactionTarget::Message(message)
            }
            (None, Some(thread_id), Some(comment_id)) => ReactionTarget::ThreadComment {
                thread: self.cache.resolve_forum_thread(&guild_id, channel_id, thread_id),
                comment_id,
            },
            (None, Some(thread_id), None) => {
                let thread = self.cache.resolve_forum_thread(&guild_id, channel_id, thread_id);
                ReactionTarget::Thread(thread)
            }
            (None, None, _) => {
                return Err(CacheError::malformed("reaction", "missing messageId or forumTopicId"));
            }
        };
        let reaction = Reaction {
            guild_id,
            channel_id: raw.channel_id,
            created_by: raw.created_by,
            emote: raw.emote,
            target,
        };
        self.cache.notify(if added {
            Notification::ReactionAdd(reaction)
        } else {
            Notification::ReactionRemove(reaction)
        });
        Ok(())
    }

    fn on_member_joined(&self, payload: MemberJoinedPayload) -> Result<(), CacheError> {
        if let Some(user) = payload.member.user.value() {
            self.cache.users().upsert(user.clone(), &Scope::default())?;
        }
        let guild = self.cache.get_guild(&payload.server_id);
        let store = guild.as_ref().map(|g| g.members());
        if let Changed::Created(member) =
            apply(store, payload.member, &Scope::guild(&payload.server_id), Change::Create)?
        {
            self.cache.notify(Notification::MemberJoin { member });
        }
        Ok(())
    }

    /// Partial member updates only merge into a cached member. An uncached
    /// member is reported detached and left for a later join or fetch.
    fn on_member_updated(&self, payload: MemberUpdatedPayload) -> Result<(), CacheError> {
        let scope = Scope::guild(&payload.server_id);
        let guild = self.cache.get_guild(&payload.server_id);
        let raw = payload.into_raw();
        let store = guild.as_ref().map(|g| g.members()).filter(|members| {
            Member::raw_key(&raw, &scope).is_some_and(|user_id| members.contains(&user_id))
        });
        if let Changed::Updated(member, previous) = apply(store, raw, &scope, Change::Update)? {
            self.cache.notify(Notification::MemberUpdate { member, previous });
        }
        Ok(())
    }

    fn on_member_removed(&self, payload: MemberRemovedPayload) {
        let member = self
            .cache
            .get_guild(&payload.server_id)
            .and_then(|g| g.members().remove(&payload.user_id))
            .map(|m| m.snapshot());
        self.cache.notify(Notification::MemberRemove {
            guild_id: payload.server_id,
            user_id: payload.user_id,
            member,
            is_kick: payload.is_kick,
            is_ban: payload.is_ban,
        });
    }

    fn on_ban(&self, payload: MemberBanPayload, change: Change) -> Result<(), CacheError> {
        let raw = payload.server_member_ban;
        if let Some(user) = raw.user.value() {
            self.cache.users().upsert(user.clone(), &Scope::default())?;
        }
        let guild = self.cache.get_guild(&payload.server_id);
        let store = guild.as_ref().map(|g| g.bans());
        self.cache.notify(match apply(store, raw, &Scope::guild(&payload.server_id), change)? {
            Changed::Created(ban) | Changed::Updated(ban, _) => Notification::MemberBan { ban },
            Changed::Deleted(ban) => Notification::MemberUnban { ban },
        });
        Ok(())
    }

    fn on_webhook(&self, payload: WebhookPayload, created: bool) -> Result<(), CacheError> {
        let scope = Scope::guild(&payload.server_id);
        let upserted = self.cache.webhooks().upsert(payload.webhook, &scope)?;
        let webhook = upserted.entity.snapshot();
        self.cache.notify(if created {
            Notification::WebhookCreate { webhook }
        } else {
            Notification::WebhookUpdate {
                webhook,
                previous: upserted.previous,
            }
        });
        Ok(())
    }

    fn on_group(&self, payload: GroupPayload, change: Change) -> Result<(), CacheError> {
        let guild = self.cache.get_guild(&payload.server_id);
        let store = guild.as_ref().map(|g| g.groups());
        let scope = Scope::guild(&payload.server_id);
        self.cache.notify(match apply(store, payload.group, &scope, change)? {
            Changed::Created(group) => Notification::GroupCreate { group },
            Changed::Updated(group, previous) => Notification::GroupUpdate { group, previous },
            Changed::Deleted(group) => Notification::GroupDelete { group },
        });
        Ok(())
    }
}

impl std::fmt::Debug for EventTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTranslator")
            .field("wait_for_caching", &self.wait_for_caching)
            .field("pending_registrations", &self.registrations.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use serde_json::json;
    use tokio::sync::broadcast::error::TryRecvError;

    fn translator() -> EventTranslator {
        EventTranslator::new(GatewayCache::new(CacheConfig::default()))
    }

    #[test]
    fn test_permission_event_names() {
        assert_eq!(
            permission_event("ChannelRolePermissionCreated"),
            Some((PermissionTarget::ChannelRole, Change::Create))
        );
        assert_eq!(
            permission_event("ChannelCategoryUserPermissionDeleted"),
            Some((PermissionTarget::CategoryUser, Change::Delete))
        );
        assert_eq!(permission_event("ChannelRolePermissionExploded"), None);
        assert_eq!(permission_event("ChatMessageCreated"), None);
    }

    #[tokio::test]
    async fn test_permission_forwarded() {
        let mut translator = translator();
        let mut rx = translator.cache().subscribe();

        translator
            .handle_event(GatewayEvent::new(
                "ChannelUserPermissionUpdated",
                json!({
                    "serverId": "g1",
                    "channelUserPermission": {
                        "permissions": {"CanReadChats": true},
                        "userId": "u1",
                        "channelId": "c1"
                    }
                }),
            ))
            .await
            .unwrap();

        match rx.try_recv().unwrap() {
            Notification::PermissionUpdate(permission) => {
                assert_eq!(permission.target, PermissionTarget::ChannelUser);
                assert_eq!(permission.guild_id, "g1");
                assert_eq!(permission.user_id.as_deref(), Some("u1"));
                assert_eq!(permission.permissions.get("CanReadChats"), Some(&true));
            }
            other => panic!("unexpected notification: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_kind_ignored() {
        let mut translator = translator();
        let mut rx = translator.cache().subscribe();
        let mut diagnostics = translator.cache().diagnostics();

        translator
            .handle_event(GatewayEvent::new("FutureThingHappened", json!({"serverId": "g1"})))
            .await
            .unwrap();

        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert!(matches!(diagnostics.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_malformed_event_diagnosed() {
        let mut translator = translator();
        let mut rx = translator.cache().subscribe();
        let mut diagnostics = translator.cache().diagnostics();

        let err = translator
            .handle_event(GatewayEvent::new("ChatMessageCreated", json!({"serverId": "g1"})))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CacheError::MalformedEvent { ref event, .. } if event == "ChatMessageCreated"
        ));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert!(matches!(
            diagnostics.try_recv().unwrap(),
            Diagnostic::MalformedEvent { ref event, .. } if event == "ChatMessageCreated"
        ));
    }

    #[tokio::test]
    async fn test_thread_lock_sets_flag() {
        let mut translator = translator();
        let mut rx = translator.cache().subscribe();

        translator
            .handle_event(GatewayEvent::new(
                "ForumTopicLocked",
                json!({"serverId": "g1", "forumTopic": {"id": 7, "channelId": "c1"}}),
            ))
            .await
            .unwrap();

        match rx.try_recv().unwrap() {
            Notification::ThreadLock { thread } => assert!(thread.is_locked),
            other => panic!("unexpected notification: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_undecodable_frame() {
        let mut translator = translator();
        let err = translator.handle_text("not json").await.unwrap_err();
        assert!(matches!(err, CacheError::Json(_)));
    }

    #[tokio::test]
    async fn test_webhook_create_then_update() {
        let mut translator = translator();
        let mut rx = translator.cache().subscribe();
        let webhook = |name: &str| {
            json!({"serverId": "g1", "webhook": {"id": "w1", "channelId": "c1", "name": name}})
        };

        translator
            .handle_event(GatewayEvent::new("ServerWebhookCreated", webhook("Hook")))
            .await
            .unwrap();
        translator
            .handle_event(GatewayEvent::new("ServerWebhookUpdated", webhook("Renamed")))
            .await
            .unwrap();

        assert!(matches!(
            rx.try_recv().unwrap(),
            Notification::WebhookCreate { ref webhook } if webhook.username == "Hook"
        ));
        match rx.try_recv().unwrap() {
            Notification::WebhookUpdate { webhook, previous } => {
                assert_eq!(webhook.username, "Renamed");
                assert_eq!(previous.map(|p| p.username).as_deref(), Some("Hook"));
            }
            other => panic!("unexpected notification: {other:?}"),
        }
        assert_eq!(translator.cache().webhooks_by_guild("g1").len(), 1);
    }
}
