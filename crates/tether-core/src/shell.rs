use std::io::{self, BufRead, Write};

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument};

use crate::api::ApiClient;
use crate::config::Config;
use crate::controller::TaskListView;
use crate::render::Renderer;
use crate::session::{Session, View};

const AUTH_COMMANDS: &[&str] = &["register", "login", "help", "quit"];
const TASK_COMMANDS: &[&str] = &[
    "list", "add", "edit", "cancel", "done", "delete", "logout", "help", "quit",
];

enum Flow {
    Continue,
    Quit,
}

/// The interactive command loop. Each view exposes its own command set;
/// commands resolve by unambiguous prefix. A failed command is printed
/// and the loop keeps going — nothing here is fatal.
pub struct Shell<'a> {
    api: &'a ApiClient,
    cfg: &'a Config,
    renderer: &'a mut Renderer,
    session: Session,
    tasks: TaskListView,
}

impl<'a> Shell<'a> {
    pub fn new(api: &'a ApiClient, cfg: &'a Config, renderer: &'a mut Renderer) -> Self {
        Self {
            api,
            cfg,
            renderer,
            session: Session::new(),
            tasks: TaskListView::new(),
        }
    }

    #[instrument(skip_all)]
    pub fn run(&mut self, input: &mut dyn BufRead) -> anyhow::Result<()> {
        println!("tether — connected to {}", self.api.base_url());
        println!("Type 'help' for commands.");

        loop {
            self.print_prompt()?;

            let mut line = String::new();
            let read = input.read_line(&mut line).context("failed reading input")?;
            if read == 0 {
                debug!("input closed");
                break;
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match self.dispatch(input, line) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(err) => eprintln!("error: {err:#}"),
            }
        }

        Ok(())
    }

    fn print_prompt(&self) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        match self.session.view() {
            View::Auth => write!(out, "tether (auth)> ")?,
            View::Tasks => match self.tasks.editing() {
                Some(id) => write!(out, "tether (editing {id})> ")?,
                None => write!(out, "tether> ")?,
            },
        }
        out.flush()?;
        Ok(())
    }

    fn dispatch(&mut self, input: &mut dyn BufRead, line: &str) -> anyhow::Result<Flow> {
        let mut parts = line.splitn(2, char::is_whitespace);
        let token = parts.next().unwrap_or_default();
        let rest = parts.next().map(str::trim).filter(|rest| !rest.is_empty());

        let known = match self.session.view() {
            View::Auth => AUTH_COMMANDS,
            View::Tasks => TASK_COMMANDS,
        };
        let Some(command) = expand_command_abbrev(token, known) else {
            return Err(anyhow!("unknown command: {token} (try 'help')"));
        };

        debug!(command, ?rest, "dispatching command");

        match command {
            "register" => self.cmd_register(rest),
            "login" => self.cmd_login(rest),
            "list" => self.cmd_list(),
            "add" => self.cmd_add(rest),
            "edit" => self.cmd_edit(rest),
            "cancel" => self.cmd_cancel(),
            "done" => self.cmd_done(rest),
            "delete" => self.cmd_delete(input, rest),
            "logout" => self.cmd_logout(),
            "help" => self.cmd_help(),
            "quit" => Ok(Flow::Quit),
            other => Err(anyhow!("unknown command: {other}")),
        }
    }

    fn cmd_register(&mut self, rest: Option<&str>) -> anyhow::Result<Flow> {
        info!("command register");
        let (username, password) = split_credentials(rest, "register")?;
        let message = self.session.register(self.api, username, password)?;
        println!("{message}");
        Ok(Flow::Continue)
    }

    fn cmd_login(&mut self, rest: Option<&str>) -> anyhow::Result<Flow> {
        info!("command login");
        let (username, password) = split_credentials(rest, "login")?;
        if self.session.login(self.api, username, password)? {
            println!("Logged in as {username}.");
            self.tasks.fetch_tasks(self.api, &self.session)?;
            self.render()?;
        } else {
            println!("Invalid credentials");
        }
        Ok(Flow::Continue)
    }

    fn cmd_list(&mut self) -> anyhow::Result<Flow> {
        self.tasks.fetch_tasks(self.api, &self.session)?;
        self.render()?;
        Ok(Flow::Continue)
    }

    /// The shared submit path: with arguments it fills the form first;
    /// bare `add` submits the form as it stands, which is how a
    /// pre-populated edit is confirmed unchanged.
    fn cmd_add(&mut self, rest: Option<&str>) -> anyhow::Result<Flow> {
        if let Some(rest) = rest {
            let (title, description) = split_title_and_description(rest);
            self.tasks.form.title = title.to_string();
            self.tasks.form.description = description.to_string();
        }

        let form = self.tasks.form.clone();
        self.tasks
            .create_task(self.api, &self.session, &form.title, &form.description)?;
        self.render()?;
        Ok(Flow::Continue)
    }

    fn cmd_edit(&mut self, rest: Option<&str>) -> anyhow::Result<Flow> {
        let id = parse_id(rest, "edit")?;
        self.tasks.edit_task(id)?;

        println!("Editing task {id}:");
        println!("  title:       {}", self.tasks.form.title);
        println!("  description: {}", self.tasks.form.description);
        println!("Submit with 'add <title> [:: <description>]' — bare 'add' keeps it as shown.");
        Ok(Flow::Continue)
    }

    fn cmd_cancel(&mut self) -> anyhow::Result<Flow> {
        if !self.tasks.cancel_visible() {
            println!("Nothing is being edited.");
            return Ok(Flow::Continue);
        }
        self.tasks.cancel_editing();
        println!("Edit cancelled.");
        Ok(Flow::Continue)
    }

    fn cmd_done(&mut self, rest: Option<&str>) -> anyhow::Result<Flow> {
        let id = parse_id(rest, "done")?;
        self.tasks.mark_completed(self.api, &self.session, id)?;
        self.render()?;
        Ok(Flow::Continue)
    }

    /// Only an explicit yes sends the request; declining performs no
    /// network action. The prompt can be disabled with the confirm
    /// config key.
    fn cmd_delete(&mut self, input: &mut dyn BufRead, rest: Option<&str>) -> anyhow::Result<Flow> {
        let id = parse_id(rest, "delete")?;

        if self.cfg.get_bool("confirm").unwrap_or(true) && !confirm_delete(input, id)? {
            info!(id, "delete declined");
            println!("Not deleted.");
            return Ok(Flow::Continue);
        }

        self.tasks.delete_task(self.api, &self.session, id)?;
        self.render()?;
        Ok(Flow::Continue)
    }

    fn cmd_logout(&mut self) -> anyhow::Result<Flow> {
        self.session.logout();
        self.tasks = TaskListView::new();
        println!("Logged out.");
        Ok(Flow::Continue)
    }

    fn cmd_help(&self) -> anyhow::Result<Flow> {
        match self.session.view() {
            View::Auth => {
                println!("register <username> <password>   create an account");
                println!("login <username> <password>      sign in");
                println!("quit                             exit");
            }
            View::Tasks => {
                println!("list                             refresh the task list");
                println!(
                    "add <title> [:: <description>]   {}",
                    self.tasks.submit_label()
                );
                println!("edit <id>                        load a task into the form");
                if self.tasks.cancel_visible() {
                    println!("cancel                           stop editing");
                }
                println!("done <id>                        mark a task completed");
                println!("delete <id>                      delete a task");
                println!("logout                           back to the auth view");
                println!("quit                             exit");
            }
        }
        Ok(Flow::Continue)
    }

    fn render(&mut self) -> anyhow::Result<()> {
        self.renderer.print_task_table(self.tasks.tasks())
    }
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

fn split_credentials<'a>(
    rest: Option<&'a str>,
    command: &str,
) -> anyhow::Result<(&'a str, &'a str)> {
    let rest = rest.ok_or_else(|| anyhow!("{command} requires <username> <password>"))?;
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(username), Some(password), None) => Ok((username, password)),
        _ => Err(anyhow!("{command} requires <username> <password>")),
    }
}

fn split_title_and_description(rest: &str) -> (&str, &str) {
    match rest.split_once("::") {
        Some((title, description)) => (title.trim(), description.trim()),
        None => (rest, ""),
    }
}

fn parse_id(rest: Option<&str>, command: &str) -> anyhow::Result<u64> {
    let rest = rest.ok_or_else(|| anyhow!("{command} requires a task id"))?;
    rest.trim()
        .parse::<u64>()
        .with_context(|| format!("{command}: invalid task id: {rest}"))
}

fn confirm_delete(input: &mut dyn BufRead, id: u64) -> anyhow::Result<bool> {
    print!("Delete task {id}? [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .context("failed reading confirmation")?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

#[cfg(test)]
mod tests {
    use httpmock::Method::{DELETE, GET, POST, PUT};
    use httpmock::MockServer;
    use serde_json::json;

    use super::{Shell, expand_command_abbrev, split_title_and_description};
    use crate::api::ApiClient;
    use crate::config::Config;
    use crate::render::Renderer;
    use crate::session::View;

    fn run_script<'a>(
        api: &'a ApiClient,
        cfg: &'a Config,
        renderer: &'a mut Renderer,
        script: &str,
    ) -> Shell<'a> {
        let mut shell = Shell::new(api, cfg, renderer);
        let mut input = script.as_bytes();
        shell.run(&mut input).expect("shell run");
        shell
    }

    fn mock_login(server: &MockServer) {
        server.mock(|when, then| {
            when.method(POST).path("/auth/login");
            then.status(200).json_body(json!({"token": "tok"}));
        });
    }

    #[test]
    fn login_switches_views_and_triggers_one_refresh() {
        let server = MockServer::start();
        mock_login(&server);
        let list = server.mock(|when, then| {
            when.method(GET).path("/tasks");
            then.status(200).json_body(json!([]));
        });

        let api = ApiClient::new(server.base_url());
        let cfg = Config::default();
        let mut renderer = Renderer::new(&cfg).expect("renderer");

        let shell = run_script(&api, &cfg, &mut renderer, "login alice pw\nquit\n");

        assert_eq!(shell.session.view(), View::Tasks);
        assert_eq!(list.hits(), 1);
    }

    #[test]
    fn failed_login_stays_on_auth_view_and_task_commands_stay_unknown() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/auth/login");
            then.status(401).json_body(json!({"message": "Invalid credentials"}));
        });
        let list = server.mock(|when, then| {
            when.method(GET).path("/tasks");
            then.status(200).json_body(json!([]));
        });

        let api = ApiClient::new(server.base_url());
        let cfg = Config::default();
        let mut renderer = Renderer::new(&cfg).expect("renderer");

        // `list` is not an auth-view command; it errors and the loop
        // keeps going
        let shell = run_script(&api, &cfg, &mut renderer, "login alice wrong\nlist\nquit\n");

        assert_eq!(shell.session.view(), View::Auth);
        assert_eq!(shell.session.token(), None);
        assert_eq!(list.hits(), 0);
    }

    #[test]
    fn register_reports_message_and_does_not_log_in() {
        let server = MockServer::start();
        let register = server.mock(|when, then| {
            when.method(POST)
                .path("/auth/register")
                .json_body(json!({"username": "bob", "password": "pw"}));
            then.status(201)
                .json_body(json!({"message": "User registered successfully"}));
        });

        let api = ApiClient::new(server.base_url());
        let cfg = Config::default();
        let mut renderer = Renderer::new(&cfg).expect("renderer");

        let shell = run_script(&api, &cfg, &mut renderer, "register bob pw\nquit\n");

        register.assert();
        assert_eq!(shell.session.view(), View::Auth);
    }

    #[test]
    fn delete_declined_sends_nothing() {
        let server = MockServer::start();
        mock_login(&server);
        let list = server.mock(|when, then| {
            when.method(GET).path("/tasks");
            then.status(200).json_body(json!([]));
        });
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/tasks/7");
            then.status(200);
        });

        let api = ApiClient::new(server.base_url());
        let cfg = Config::default();
        let mut renderer = Renderer::new(&cfg).expect("renderer");

        run_script(&api, &cfg, &mut renderer, "login alice pw\ndelete 7\nn\nquit\n");

        assert_eq!(delete.hits(), 0);
        assert_eq!(list.hits(), 1);
    }

    #[test]
    fn delete_accepted_sends_one_request_then_refreshes() {
        let server = MockServer::start();
        mock_login(&server);
        let list = server.mock(|when, then| {
            when.method(GET).path("/tasks");
            then.status(200).json_body(json!([]));
        });
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/tasks/7");
            then.status(200);
        });

        let api = ApiClient::new(server.base_url());
        let cfg = Config::default();
        let mut renderer = Renderer::new(&cfg).expect("renderer");

        run_script(&api, &cfg, &mut renderer, "login alice pw\ndelete 7\ny\nquit\n");

        assert_eq!(delete.hits(), 1);
        assert_eq!(list.hits(), 2);
    }

    #[test]
    fn confirm_off_skips_the_prompt() {
        let server = MockServer::start();
        mock_login(&server);
        server.mock(|when, then| {
            when.method(GET).path("/tasks");
            then.status(200).json_body(json!([]));
        });
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/tasks/7");
            then.status(200);
        });

        let api = ApiClient::new(server.base_url());
        let mut cfg = Config::default();
        cfg.apply_overrides(vec![("confirm".to_string(), "off".to_string())]);
        let mut renderer = Renderer::new(&cfg).expect("renderer");

        // no y/n line in the script; the prompt never happens
        run_script(&api, &cfg, &mut renderer, "login alice pw\ndelete 7\nquit\n");

        assert_eq!(delete.hits(), 1);
    }

    #[test]
    fn edit_then_add_updates_instead_of_creating() {
        let server = MockServer::start();
        mock_login(&server);
        server.mock(|when, then| {
            when.method(GET).path("/tasks");
            then.status(200).json_body(json!([
                {"id": 5, "title": "old", "description": "d", "completed": false},
            ]));
        });
        let create = server.mock(|when, then| {
            when.method(POST).path("/tasks");
            then.status(201);
        });
        let update = server.mock(|when, then| {
            when.method(PUT)
                .path("/tasks/5")
                .json_body(json!({"title": "X", "description": "Y"}));
            then.status(200);
        });

        let api = ApiClient::new(server.base_url());
        let cfg = Config::default();
        let mut renderer = Renderer::new(&cfg).expect("renderer");

        let shell = run_script(
            &api,
            &cfg,
            &mut renderer,
            "login alice pw\nedit 5\nadd X :: Y\nquit\n",
        );

        assert_eq!(create.hits(), 0);
        assert_eq!(update.hits(), 1);
        assert!(!shell.tasks.is_editing());
    }

    #[test]
    fn logout_returns_to_auth_and_drops_edit_state() {
        let server = MockServer::start();
        mock_login(&server);
        server.mock(|when, then| {
            when.method(GET).path("/tasks");
            then.status(200).json_body(json!([
                {"id": 5, "title": "old", "description": "d", "completed": false},
            ]));
        });

        let api = ApiClient::new(server.base_url());
        let cfg = Config::default();
        let mut renderer = Renderer::new(&cfg).expect("renderer");

        let shell = run_script(
            &api,
            &cfg,
            &mut renderer,
            "login alice pw\nedit 5\nlogout\nquit\n",
        );

        assert_eq!(shell.session.view(), View::Auth);
        assert_eq!(shell.session.token(), None);
        assert!(!shell.tasks.is_editing());
        assert_eq!(shell.tasks.form.title, "");
        assert!(shell.tasks.tasks().is_empty());
    }

    #[test]
    fn command_abbreviations_resolve_unambiguous_prefixes() {
        let known = &["list", "add", "edit", "cancel", "done", "delete", "logout", "help", "quit"];
        assert_eq!(expand_command_abbrev("li", known), Some("list"));
        assert_eq!(expand_command_abbrev("a", known), Some("add"));
        assert_eq!(expand_command_abbrev("d", known), None); // done/delete
        assert_eq!(expand_command_abbrev("l", known), None); // list/logout
        assert_eq!(expand_command_abbrev("q", known), Some("quit"));
        assert_eq!(expand_command_abbrev("frob", known), None);
    }

    #[test]
    fn title_and_description_split_on_double_colon() {
        assert_eq!(
            split_title_and_description("Buy milk :: 2 liters"),
            ("Buy milk", "2 liters")
        );
        assert_eq!(split_title_and_description("Buy milk"), ("Buy milk", ""));
        assert_eq!(split_title_and_description("a::b"), ("a", "b"));
    }
}
