use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use blockbot::robot::{
    ExecutorError, Motor, MotorDirection, MotorState, MoveDirection, RobotCommand,
    SequentialExecutor, StatusStore,
};
use blockbot_test_utils::{RecordingChannel, init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn connected_executor(channel: &RecordingChannel) -> Arc<SequentialExecutor> {
    let executor = Arc::new(SequentialExecutor::new(Arc::new(StatusStore::new()), 60));
    executor.connect(channel.arc());
    executor
}

fn wait_ms(ms: u64) -> RobotCommand {
    RobotCommand::wait(Duration::from_millis(ms))
}

#[tokio::test]
async fn commands_apply_in_order_and_reach_the_device() -> TestResult {
    init_tracing();
    let channel = RecordingChannel::new();
    let executor = connected_executor(&channel);

    let report = with_timeout(executor.run(vec![
        RobotCommand::set_motor_power(Motor::Left, -30),
        RobotCommand::set_servo_angle(2, 270.0),
        wait_ms(5),
        RobotCommand::move_for(MoveDirection::Right, Duration::from_millis(10)),
    ]))
    .await?;

    assert_eq!(report.executed, 4);
    assert!(!report.stopped);
    assert_eq!(
        channel.kinds(),
        vec!["set_motor_power", "set_servo_angle", "move", "stop_motors"]
    );

    let status = executor.status().snapshot();
    assert!(!status.running);
    assert!(status.connected);
    // The move's implicit stop overrides the earlier set-power.
    assert_eq!(status.motors.left, MotorState::STOPPED);
    // Servo angles are clamped to the physical range.
    assert_eq!(status.servos.get(&2), Some(&180.0));
    Ok(())
}

#[tokio::test]
async fn second_start_is_rejected_and_leaves_queue_alone() -> TestResult {
    let channel = RecordingChannel::new();
    let executor = connected_executor(&channel);

    let handle = executor.start(vec![wait_ms(100), wait_ms(5), wait_ms(5)])?;
    tokio::time::sleep(Duration::from_millis(20)).await;
    let pending_before = executor.pending();

    let err = executor.start(vec![RobotCommand::stop_motors()]).unwrap_err();
    assert_eq!(err, ExecutorError::AlreadyRunning);
    assert_eq!(executor.pending(), pending_before);
    assert_eq!(pending_before, 2);

    let report = with_timeout(handle.wait()).await;
    assert_eq!(report.executed, 3);
    assert!(channel.kinds().is_empty());
    Ok(())
}

#[tokio::test]
async fn start_requires_a_connected_channel() {
    let channel = RecordingChannel::new();
    channel.set_connected(false);
    let executor = connected_executor(&channel);

    let err = executor.start(vec![RobotCommand::stop_motors()]).unwrap_err();
    assert_eq!(err, ExecutorError::NotConnected);
    assert!(!executor.is_running());
    assert!(!executor.status().snapshot().running);
}

#[tokio::test]
async fn move_effects_are_visible_before_the_delay_and_stop_after() -> TestResult {
    let channel = RecordingChannel::new();
    let executor = connected_executor(&channel);

    let seen: Arc<Mutex<Vec<(i32, MotorDirection, i32)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    executor.status().subscribe(move |status| {
        sink.lock().unwrap().push((
            status.motors.left.power,
            status.motors.left.direction,
            status.motors.right.power,
        ));
    });

    let handle = executor.start(vec![RobotCommand::move_for(
        MoveDirection::Forward,
        Duration::from_millis(150),
    )])?;

    tokio::time::sleep(Duration::from_millis(50)).await;
    let during = executor.status().snapshot();
    assert_eq!(during.motors.left.power, 60);
    assert_eq!(during.motors.right.power, 60);
    assert_eq!(during.motors.left.direction, MotorDirection::Forward);

    with_timeout(handle.wait()).await;
    let after = executor.status().snapshot();
    assert_eq!(after.motors.left, MotorState::STOPPED);
    assert_eq!(after.motors.right, MotorState::STOPPED);

    let seen = seen.lock().unwrap();
    let drive = seen
        .iter()
        .position(|s| *s == (60, MotorDirection::Forward, 60))
        .expect("drive update observed");
    let stop = seen
        .iter()
        .rposition(|s| *s == (0, MotorDirection::Stop, 0))
        .expect("stop update observed");
    assert!(drive < stop);
    Ok(())
}

#[tokio::test]
async fn stop_cancels_an_in_flight_wait_and_stops_motors() -> TestResult {
    let channel = RecordingChannel::new();
    let executor = connected_executor(&channel);

    let handle = executor.start(vec![
        RobotCommand::set_motor_power(Motor::Right, 80),
        wait_ms(10_000),
        RobotCommand::set_motor_power(Motor::Left, 80),
    ])?;
    tokio::time::sleep(Duration::from_millis(30)).await;

    executor.stop();
    let report = with_timeout(handle.wait()).await;

    assert!(report.stopped);
    assert_eq!(report.executed, 1);
    assert!(!executor.is_running());
    assert_eq!(executor.pending(), 0);

    let status = executor.status().snapshot();
    assert!(!status.running);
    assert_eq!(status.motors.left.power, 0);
    assert_eq!(status.motors.right.power, 0);
    assert_eq!(channel.kinds(), vec!["set_motor_power", "stop_motors"]);
    Ok(())
}

#[tokio::test]
async fn stop_while_idle_still_zeroes_motors() {
    let channel = RecordingChannel::new();
    let executor = connected_executor(&channel);

    executor.stop();

    let status = executor.status().snapshot();
    assert_eq!(status.motors.left, MotorState::STOPPED);
    assert_eq!(status.motors.right, MotorState::STOPPED);
    assert_eq!(channel.kinds(), vec!["stop_motors"]);
}

#[tokio::test]
async fn unknown_commands_and_send_failures_are_not_fatal() -> TestResult {
    let channel = RecordingChannel::new();
    let executor = connected_executor(&channel);
    channel.fail_sends(true);

    let commands: Vec<RobotCommand> = serde_json::from_str(
        r#"[
            {"type": "set_motor_power", "motor": "left", "power": 25},
            {"type": "play_tone", "frequency": 440},
            {"type": "set_servo_angle", "servo": 1, "angle": 45}
        ]"#,
    )?;
    let report = with_timeout(executor.run(commands)).await?;

    assert_eq!(report.executed, 2);
    assert_eq!(report.skipped, 1);
    assert!(channel.kinds().is_empty());

    let status = executor.status().snapshot();
    assert_eq!(status.motors.left.power, 25);
    assert_eq!(status.servos.get(&1), Some(&45.0));
    Ok(())
}

#[tokio::test]
async fn channel_dropping_mid_run_degrades_to_local_simulation() -> TestResult {
    let channel = RecordingChannel::new();
    let executor = connected_executor(&channel);

    let handle = executor.start(vec![
        wait_ms(30),
        RobotCommand::set_motor_power(Motor::Left, 70),
    ])?;
    channel.set_connected(false);

    let report = with_timeout(handle.wait()).await;
    assert_eq!(report.executed, 2);
    assert_eq!(executor.status().snapshot().motors.left.power, 70);
    assert!(channel.kinds().is_empty());
    Ok(())
}

#[tokio::test]
async fn disconnect_resets_status_and_allows_reconnect() -> TestResult {
    let channel = RecordingChannel::new();
    let executor = connected_executor(&channel);

    let handle = executor.start(vec![wait_ms(10_000)])?;
    executor.disconnect();
    assert!(with_timeout(handle.wait()).await.stopped);

    let status = executor.status().snapshot();
    assert!(!status.connected);
    assert!(!status.running);
    assert_eq!(
        executor.start(vec![]).unwrap_err(),
        ExecutorError::NotConnected
    );

    executor.connect(channel.arc());
    let report = with_timeout(executor.run(vec![RobotCommand::stop_motors()])).await?;
    assert_eq!(report.executed, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn status_listeners_may_query_the_executor() -> TestResult {
    init_tracing();
    let channel = RecordingChannel::new();
    let executor = connected_executor(&channel);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let weak = Arc::downgrade(&executor);
    executor.status().subscribe(move |status| {
        if let Some(executor) = weak.upgrade() {
            sink.lock()
                .unwrap()
                .push((status.running, executor.is_running(), executor.pending()));
        }
    });

    let report = with_timeout(executor.run(vec![RobotCommand::stop_motors()])).await?;
    assert_eq!(report.executed, 1);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![(true, true, 1), (true, true, 0), (false, false, 0)]
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_start_and_stop_leave_status_consistent() -> TestResult {
    let channel = RecordingChannel::new();
    let executor = connected_executor(&channel);

    for _ in 0..200 {
        let starter = Arc::clone(&executor);
        let stopper = Arc::clone(&executor);
        let start = tokio::spawn(async move { starter.start(vec![wait_ms(10_000)]).is_ok() });
        let stop = tokio::spawn(async move { stopper.stop() });
        let started = start.await?;
        stop.await?;

        assert_eq!(
            executor.status().snapshot().running,
            executor.is_running(),
            "status diverged from executor state (started: {started})"
        );
        executor.stop();
        assert!(!executor.status().snapshot().running);
    }
    Ok(())
}
