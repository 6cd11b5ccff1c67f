//! Tagging API exposed to plugin code as the `plugin` global
//!
//! ```lua
//! first = plugin.commands("first", "1st")(function(bot, trigger) end)
//! tick = plugin.interval(5)(function(bot) end)
//! ```
//!
//! Tags live in a weak-keyed side table keyed by function identity, so a
//! function dropped by its module takes its tags with it.

use crate::domain::entities::Tag;
use mlua::{Function, Lua, Table, Value, Variadic};

const TAGS_KEY: &str = "wirebot.tags";

/// Name of the global table holding the tagging functions
pub const API_GLOBAL: &str = "plugin";

/// Install the side table and the `plugin` global into a fresh state
pub(crate) fn install(lua: &Lua) -> mlua::Result<()> {
    let side_table = lua.create_table()?;
    let weak_keys = lua.create_table()?;
    weak_keys.set("__mode", "k")?;
    side_table.set_metatable(Some(weak_keys));
    lua.set_named_registry_value(TAGS_KEY, side_table)?;

    let api = lua.create_table()?;
    api.set(
        "commands",
        lua.create_function(|lua, names: Variadic<String>| {
            if names.is_empty() {
                return Err(mlua::Error::RuntimeError(
                    "plugin.commands() needs at least one command name".to_string(),
                ));
            }
            decorator(lua, names.into_iter().map(Tag::Command).collect())
        })?,
    )?;
    api.set(
        "interval",
        lua.create_function(|lua, seconds: f64| {
            if !(seconds.is_finite() && seconds > 0.0) {
                return Err(mlua::Error::RuntimeError(
                    "plugin.interval() needs a positive number of seconds".to_string(),
                ));
            }
            decorator(lua, vec![Tag::Interval(seconds)])
        })?,
    )?;
    api.set(
        "url",
        lua.create_function(|lua, patterns: Variadic<String>| {
            decorator(lua, patterns.into_iter().map(Tag::Url).collect())
        })?,
    )?;
    api.set(
        "event",
        lua.create_function(|lua, events: Variadic<String>| {
            decorator(lua, events.into_iter().map(Tag::Event).collect())
        })?,
    )?;
    lua.globals().set(API_GLOBAL, api)?;

    Ok(())
}

/// Tags recorded for `func`, in declaration order
pub(crate) fn tags_for<'lua>(lua: &'lua Lua, func: &Function<'lua>) -> mlua::Result<Vec<Tag>> {
    let side_table: Table = lua.named_registry_value(TAGS_KEY)?;
    let Some(list) = side_table.raw_get::<_, Option<Table>>(func.clone())? else {
        return Ok(Vec::new());
    };

    let mut tags = Vec::new();
    for entry in list.sequence_values::<Table>() {
        if let Some(tag) = tag_from_lua(&entry?)? {
            tags.push(tag);
        }
    }
    Ok(tags)
}

fn decorator(lua: &Lua, new_tags: Vec<Tag>) -> mlua::Result<Function<'_>> {
    lua.create_function(move |lua, func: Function| {
        attach(lua, &func, &new_tags)?;
        Ok(func)
    })
}

fn attach<'lua>(lua: &'lua Lua, func: &Function<'lua>, new_tags: &[Tag]) -> mlua::Result<()> {
    let side_table: Table = lua.named_registry_value(TAGS_KEY)?;
    let list = match side_table.raw_get::<_, Option<Table>>(func.clone())? {
        Some(list) => list,
        None => {
            let list = lua.create_table()?;
            side_table.raw_set(func.clone(), list.clone())?;
            list
        }
    };

    for tag in new_tags {
        list.raw_set(list.raw_len() + 1, tag_to_lua(lua, tag)?)?;
    }
    Ok(())
}

fn tag_to_lua<'lua>(lua: &'lua Lua, tag: &Tag) -> mlua::Result<Table<'lua>> {
    let entry = lua.create_table()?;
    entry.set("kind", tag.kind())?;
    match tag {
        Tag::Command(value) | Tag::Url(value) | Tag::Event(value) => entry.set("value", value.as_str())?,
        Tag::Interval(seconds) => entry.set("value", *seconds)?,
    }
    Ok(entry)
}

fn tag_from_lua(entry: &Table) -> mlua::Result<Option<Tag>> {
    let kind: String = entry.get("kind")?;
    let value: Value = entry.get("value")?;
    let tag = match (kind.as_str(), value) {
        ("command", Value::String(s)) => Tag::Command(s.to_str()?.to_string()),
        ("url", Value::String(s)) => Tag::Url(s.to_str()?.to_string()),
        ("event", Value::String(s)) => Tag::Event(s.to_str()?.to_string()),
        ("interval", Value::Integer(n)) if n > 0 => Tag::Interval(n as f64),
        ("interval", Value::Number(n)) if n > 0.0 => Tag::Interval(n),
        _ => {
            tracing::debug!("Ignoring malformed tag entry of kind {}", kind);
            return Ok(None);
        }
    };
    Ok(Some(tag))
}
