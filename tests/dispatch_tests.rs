//! End-to-end dispatch behavior against a scripted robot peer.

#![cfg(not(target_os = "espidf"))]

use std::cell::RefCell;
use std::time::Duration;

use buttonhub::adapters::http::HttpPort;
use buttonhub::dispatch::Dispatcher;
use buttonhub::error::Result;
use buttonhub::model::{Command, CommandAction};
use buttonhub::robot_info::RobotInfoHolder;
use buttonhub::rpc::{
    Location, ResultCode, RobotApiPort, RobotCommand, Shelf, Shortcut,
    StartCommandRequest, StartCommandResponse,
};

/// Robot double: fixed metadata, records every StartCommand.
struct FakeRobot {
    version: String,
    requests: RefCell<Vec<StartCommandRequest>>,
}

impl FakeRobot {
    fn at_version(version: &str) -> Self {
        Self {
            version: version.into(),
            requests: RefCell::new(Vec::new()),
        }
    }
}

impl RobotApiPort for FakeRobot {
    fn get_robot_version(&self) -> (ResultCode, String) {
        (ResultCode::Ok, self.version.clone())
    }
    fn get_shelves(&self) -> (ResultCode, Vec<Shelf>) {
        (ResultCode::Ok, vec![Shelf {
            id: "S01".into(),
            name: "Meal tray".into(),
        }])
    }
    fn get_locations(&self) -> (ResultCode, Vec<Location>) {
        (ResultCode::Ok, vec![Location {
            id: "L01".into(),
            name: "Ward 3".into(),
            kind: 0,
        }])
    }
    fn get_shortcuts(&self) -> (ResultCode, Vec<Shortcut>) {
        (ResultCode::Ok, vec![Shortcut {
            id: "SC1".into(),
            name: "Evening round".into(),
        }])
    }
    fn start_command(
        &self,
        request: &StartCommandRequest,
    ) -> (ResultCode, StartCommandResponse) {
        self.requests.borrow_mut().push(request.clone());
        (ResultCode::Ok, StartCommandResponse::default())
    }
    fn proceed(&self) -> ResultCode {
        ResultCode::Ok
    }
    fn cancel_command(&self) -> ResultCode {
        ResultCode::Ok
    }
}

struct NoHttp;
impl HttpPort for NoHttp {
    fn get(&mut self, _url: &str) -> Result<()> {
        panic!("unexpected http call");
    }
    fn post(&mut self, _url: &str, _body: &str) -> Result<()> {
        panic!("unexpected http call");
    }
}

fn info_for(robot: &FakeRobot) -> RobotInfoHolder {
    let holder = RobotInfoHolder::new();
    assert!(holder.refresh(robot));
    holder
}

fn locked_move() -> Command {
    Command {
        action: CommandAction::MoveShelf {
            shelf_id: "S01".into(),
            location_id: "L01".into(),
        },
        lock_duration_sec: 5.0,
        ..Command::default()
    }
}

#[test]
fn pre_native_robot_gets_primary_then_lock() {
    let robot = FakeRobot::at_version("3.0.9");
    let info = info_for(&robot);
    let mut http = NoHttp;
    let mut dispatcher =
        Dispatcher::new(&robot, &mut http, &info).with_shim_delay(Duration::ZERO);

    assert!(dispatcher.dispatch(&locked_move()));

    let requests = robot.requests.borrow();
    assert_eq!(requests.len(), 2);
    assert!(matches!(requests[0].command, RobotCommand::MoveShelf { .. }));
    assert_eq!(requests[0].lock_duration_sec, 0.0);
    assert_eq!(requests[1].command, RobotCommand::Lock { duration_sec: 5.0 });
}

#[test]
fn native_robot_gets_exactly_one_call() {
    let robot = FakeRobot::at_version("3.1.0");
    let info = info_for(&robot);
    let mut http = NoHttp;
    let mut dispatcher =
        Dispatcher::new(&robot, &mut http, &info).with_shim_delay(Duration::ZERO);

    assert!(dispatcher.dispatch(&locked_move()));

    let requests = robot.requests.borrow();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].lock_duration_sec, 5.0);
}

#[test]
fn titles_come_from_robot_metadata() {
    let robot = FakeRobot::at_version("3.1.0");
    let info = info_for(&robot);
    let mut http = NoHttp;
    let mut dispatcher =
        Dispatcher::new(&robot, &mut http, &info).with_shim_delay(Duration::ZERO);

    dispatcher.dispatch(&locked_move());
    dispatcher.dispatch(&Command {
        action: CommandAction::Shortcut {
            shortcut_id: "SC1".into(),
        },
        ..Command::default()
    });

    let requests = robot.requests.borrow();
    assert_eq!(requests[0].title, "Move Meal tray to Ward 3");
    assert_eq!(requests[1].title, "Evening round");
}

#[test]
fn command_flags_are_forwarded() {
    let robot = FakeRobot::at_version("3.1.0");
    let info = info_for(&robot);
    let mut http = NoHttp;
    let mut dispatcher =
        Dispatcher::new(&robot, &mut http, &info).with_shim_delay(Duration::ZERO);

    dispatcher.dispatch(&Command {
        action: CommandAction::ReturnHome,
        cancel_all: true,
        tts_on_success: "back home".into(),
        deferrable: true,
        lock_duration_sec: 0.0,
    });

    let requests = robot.requests.borrow();
    assert!(requests[0].cancel_all);
    assert!(requests[0].deferrable);
    assert_eq!(requests[0].tts_on_success, "back home");
    assert_eq!(requests[0].command, RobotCommand::ReturnHome);
}
