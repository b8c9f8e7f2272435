//! Integration tests for TIPC stream sockets
//!
//! Tests that need a kernel with TIPC support print a message and return
//! early when `socket(AF_TIPC, SOCK_STREAM)` is not available.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use socket2::{Domain, Socket, Type};
use tipc_net::net::{
    dial_tipc, family, listen_tipc, AddrType, AddressParser, Conn, Error, Listener, Scope,
    TipcAddr, TipcDialer, TipcListenerBuilder,
};

fn tipc_available() -> bool {
    match Socket::new(Domain::from(family::AF_TIPC), Type::STREAM, None) {
        Ok(_) => true,
        Err(err) => {
            println!("Skipping TIPC test - AF_TIPC not available: {}", err);
            false
        }
    }
}

/// Service type unique to this test process, above the reserved range.
fn test_service(offset: u32) -> u32 {
    100_000 + (std::process::id() % 50_000) * 16 + offset
}

#[test]
fn test_parse_format_scenarios() {
    let addr = AddressParser::parse("100;200").expect("Failed to parse name");
    assert_eq!(addr.addr_type, AddrType::NAME);
    assert_eq!(addr.scope, Scope::ZONE);
    assert_eq!((addr.service, addr.instance, addr.domain), (100, 200, 0));
    assert_eq!(addr.to_string(), "100;200");

    let addr = AddressParser::parse("100;200-300").expect("Failed to parse range");
    assert_eq!(addr.addr_type, AddrType::NAME_SEQ);
    assert_eq!(addr.scope, Scope::ZONE);
    assert_eq!((addr.service, addr.instance, addr.domain), (100, 200, 300));
    assert_eq!(addr.to_string(), "100;200-300");
}

#[test]
fn test_sockaddr_matches_wire_form() {
    let addr = TipcAddr::name_seq(100, 200, 300);
    let sa = addr.to_sockaddr();
    assert_eq!(sa.family() as i32, family::AF_TIPC);
    assert_eq!(TipcAddr::from_sockaddr(&sa), Some(addr));
}

#[test]
fn test_validation_before_socket() {
    let raddr = TipcAddr::name(1, 1);

    let err = dial_tipc("tcp", None, Some(&raddr)).expect_err("tcp must be rejected");
    assert!(matches!(err.cause(), Error::UnknownNetwork(_)));

    let err = dial_tipc("tipc", None, None).expect_err("missing remote must be rejected");
    assert!(matches!(err.cause(), Error::MissingAddress));

    let err = listen_tipc("tipc", None).expect_err("missing local must be rejected");
    assert!(matches!(err.cause(), Error::MissingAddress));

    let err = TipcListenerBuilder::new()
        .listen("tipc6", Some(&raddr))
        .expect_err("unknown network must be rejected");
    assert!(matches!(err.cause(), Error::UnknownNetwork(n) if n == "tipc6"));
}

#[test]
fn test_full_client_server_flow() {
    if !tipc_available() {
        return;
    }

    let service = test_service(0);
    let laddr = TipcAddr::name(service, 1);
    let listener = match listen_tipc("tipc", Some(&laddr)) {
        Ok(listener) => listener,
        Err(err) => {
            println!("Skipping TIPC test - cannot bind {}: {}", laddr, err);
            return;
        }
    };
    println!("Server listening on {}", listener.addr());

    let server_handle = std::thread::spawn(move || {
        let mut conn = listener.accept().expect("Failed to accept connection");
        println!(
            "Server accepted connection from {}",
            TipcAddr::describe(conn.remote_addr().as_ref())
        );

        let mut buf = [0u8; 1024];
        let n = conn.read(&mut buf).expect("Failed to read from client");
        assert_eq!(&buf[..n], b"Hello from client");

        conn.write_all(b"Hello from server")
            .expect("Failed to write to client");
        conn.close().expect("Failed to close server side");
    });

    let raddr: TipcAddr = format!("{};1", service).parse().unwrap();
    let mut client = TipcDialer::new()
        .timeout(Duration::from_secs(5))
        .connect(&raddr)
        .expect("Failed to connect");

    client
        .write_all(b"Hello from client")
        .expect("Failed to write to server");

    let mut response = Vec::new();
    client
        .read_to_end(&mut response)
        .expect("Failed to read from server");
    assert_eq!(response, b"Hello from server");

    client.close().expect("Failed to close client");
    server_handle.join().expect("Server thread panicked");
}

#[test]
fn test_name_sequence_listener() {
    if !tipc_available() {
        return;
    }

    let service = test_service(1);
    let laddr = TipcAddr::name_seq(service, 10, 20);
    let listener = match TipcListenerBuilder::new()
        .backlog(4)
        .scope(Scope::NODE)
        .bind(&laddr)
    {
        Ok(listener) => listener,
        Err(err) => {
            println!("Skipping TIPC test - cannot bind {}: {}", laddr, err);
            return;
        }
    };

    let server_handle = std::thread::spawn(move || {
        let mut conn = listener.accept().expect("Failed to accept");
        let mut buf = [0u8; 2];
        conn.read_exact(&mut buf).expect("Failed to read");
        buf
    });

    // Any instance inside the published range reaches the listener
    let mut client =
        dial_tipc("tipc", None, Some(&TipcAddr::name(service, 15))).expect("Failed to dial");
    client.write_all(b"ok").expect("Failed to write");

    assert_eq!(&server_handle.join().expect("Server thread panicked"), b"ok");
}

#[test]
fn test_socket_options() {
    if !tipc_available() {
        return;
    }

    let service = test_service(2);
    let listener = match listen_tipc("tipc", Some(&TipcAddr::name(service, 0))) {
        Ok(listener) => listener,
        Err(err) => {
            println!("Skipping TIPC test - cannot bind: {}", err);
            return;
        }
    };

    let server_handle = std::thread::spawn(move || {
        let conn = listener.accept().expect("Failed to accept");
        std::thread::sleep(Duration::from_millis(200));
        drop(conn);
    });

    let client =
        dial_tipc("tipc", None, Some(&TipcAddr::name(service, 0))).expect("Failed to connect");

    client.set_linger(1).expect("Failed to set linger");
    client.set_linger(-1).expect("Failed to reset linger");
    client.set_keep_alive(true).expect("Failed to set keepalive");

    server_handle.join().expect("Server thread panicked");
}

#[test]
fn test_accept_deadline() {
    if !tipc_available() {
        return;
    }

    let service = test_service(3);
    let mut listener = match listen_tipc("tipc", Some(&TipcAddr::name(service, 0))) {
        Ok(listener) => listener,
        Err(err) => {
            println!("Skipping TIPC test - cannot bind: {}", err);
            return;
        }
    };

    listener
        .set_deadline(Some(Instant::now() + Duration::from_millis(100)))
        .unwrap();
    let err = listener.accept().expect_err("accept should time out");
    assert!(err.is_timeout());

    // Still usable after the timeout
    listener.set_deadline(None).unwrap();
    Listener::close(&mut listener).expect("Failed to close listener");
    assert!(matches!(
        listener.accept().unwrap_err().cause(),
        Error::InvalidDescriptor
    ));
}

#[test]
fn test_tipc_through_generic_traits() {
    if !tipc_available() {
        return;
    }

    let service = test_service(4);
    let laddr = TipcAddr::name(service, 7);
    let mut listener: Box<dyn Listener> = match listen_tipc("tipc", Some(&laddr)) {
        Ok(listener) => Box::new(listener),
        Err(err) => {
            println!("Skipping TIPC test - cannot bind: {}", err);
            return;
        }
    };
    assert_eq!(listener.addr().network(), "tipc");

    let server_handle = std::thread::spawn(move || {
        let mut conn = listener.accept().expect("Failed to accept");
        let mut buf = [0u8; 5];
        conn.read_exact(&mut buf).expect("Failed to read");
        conn.write_all(&buf).expect("Failed to echo");
    });

    let mut conn: Box<dyn Conn> =
        Box::new(dial_tipc("tipc", None, Some(&laddr)).expect("Failed to dial"));
    conn.set_deadline(Some(Instant::now() + Duration::from_secs(5)))
        .unwrap();
    conn.write_all(b"hello").unwrap();
    let mut buf = [0u8; 5];
    conn.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"hello");
    conn.close().unwrap();

    server_handle.join().expect("Server thread panicked");
}
