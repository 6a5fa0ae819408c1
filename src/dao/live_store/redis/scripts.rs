//! Lua scripts for compound operations that must run atomically on the server.

/// Pop the head when it belongs to someone else, else enqueue ARGV[1] once.
pub const TAKE_OR_ENQUEUE: &str = r#"
local head = redis.call('LINDEX', KEYS[1], 0)
if head and head ~= ARGV[1] then
    redis.call('LPOP', KEYS[1])
    return {'paired', head}
end
if redis.call('LPOS', KEYS[1], ARGV[1]) then
    return {'queued', ''}
end
redis.call('RPUSH', KEYS[1], ARGV[1])
return {'enqueued', ''}
"#;

/// Delete KEYS[1] only while it holds ARGV[1].
pub const DELETE_IF_EQUALS: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// INCR then PEXPIRE in one step.
pub const INCR_WITH_EXPIRY: &str = r#"
local value = redis.call('INCR', KEYS[1])
redis.call('PEXPIRE', KEYS[1], ARGV[1])
return value
"#;
